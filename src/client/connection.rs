//! An open database connection.

use std::fmt;
use std::net::IpAddr;

use tracing::{debug, warn};

use crate::connection::{
    Connector, ConnectionParams, Established, Session, SessionInfo, TransportFactory,
};
use crate::error::{ConnectionError, ImportError, QueryError};
use crate::import::{is_import_query, ImportJob};
use crate::query::{
    ExecutionContext, NamedParameter, Parameter, PreparedStatement, QueryResult, Row, Rows,
    Statement,
};
use crate::transport::messages::Attributes;
use crate::transport::{shared, SharedTransport};

/// A logged-in session with an Exasol database.
///
/// Statements run one at a time. A transport failure closes the connection;
/// every later call fails until a new connection is opened.
///
/// # Example
///
/// ```no_run
/// # use exasol_wire::client::Connection;
/// # use exasol_wire::connection::ConnectionParams;
/// # async fn example(params: ConnectionParams) -> Result<(), Box<dyn std::error::Error>> {
/// let mut connection = Connection::open(params).await?;
/// connection.execute_update("CREATE TABLE t (id DECIMAL(18,0))").await?;
/// connection
///     .execute_with("INSERT INTO t VALUES (?)", &[1.into(), 2.into(), 3.into()])
///     .await?;
///
/// for row in connection.query("SELECT id FROM t ORDER BY id").await? {
///     println!("{}", row.get::<i64>(0)?);
/// }
/// connection.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    params: ConnectionParams,
    host: String,
    transport: SharedTransport,
    context: ExecutionContext,
    session: Session,
}

impl Connection {
    /// Connect over WebSocket to the first host that accepts the login.
    pub async fn open(params: ConnectionParams) -> Result<Self, ConnectionError> {
        let established = Connector::new(&params).connect().await?;
        Ok(Self::from_established(params, established))
    }

    /// Connect with transports produced by `factory`.
    pub async fn open_with(
        params: ConnectionParams,
        factory: impl TransportFactory,
    ) -> Result<Self, ConnectionError> {
        let established = Connector::with_factory(&params, factory).connect().await?;
        Ok(Self::from_established(params, established))
    }

    fn from_established(params: ConnectionParams, established: Established) -> Self {
        let Established {
            transport,
            session_info,
            host,
        } = established;

        let transport = shared(transport);
        let config = params.session_config();
        let context = ExecutionContext::new(transport.clone(), &config);
        let session = Session::new(session_info, config, params.schema.clone());

        Self {
            params,
            host,
            transport,
            context,
            session,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// The host this connection reached.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_info(&self) -> &SessionInfo {
        self.session.info()
    }

    pub fn current_schema(&self) -> Option<&str> {
        self.session.current_schema()
    }

    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    pub fn is_closed(&self) -> bool {
        !self.session.state().is_active()
    }

    /// Execution context for building statements by hand.
    pub fn context(&self) -> Result<ExecutionContext, QueryError> {
        self.session.ensure_active()?;
        Ok(self.context.clone())
    }

    /// Run a statement without parameters.
    ///
    /// `IMPORT ... FROM LOCAL CSV` statements are served from the local files
    /// they name.
    pub async fn execute(&mut self, sql: &str) -> Result<QueryResult, QueryError> {
        self.session.ensure_active()?;
        let result = if is_import_query(sql) {
            self.execute_import(sql).await
        } else {
            Statement::new(self.context.clone(), sql).execute().await
        };
        self.track(result)
    }

    /// Run a statement with a flat positional parameter list.
    ///
    /// The list may hold several rows; it must split evenly across the
    /// statement's parameter columns.
    pub async fn execute_with(
        &mut self,
        sql: &str,
        params: &[Parameter],
    ) -> Result<QueryResult, QueryError> {
        if params.is_empty() {
            return self.execute(sql).await;
        }
        self.session.ensure_active()?;
        let result = Statement::new(self.context.clone(), sql)
            .bind_all(params.iter().cloned())
            .execute()
            .await;
        self.track(result)
    }

    /// Same as [`Connection::execute_with`] for values that may carry names.
    pub async fn execute_named(
        &mut self,
        sql: &str,
        params: Vec<NamedParameter>,
    ) -> Result<QueryResult, QueryError> {
        let statement = Statement::new(self.context.clone(), sql).bind_named(params)?;
        self.execute_with(sql, statement.parameters()).await
    }

    /// Run DML or DDL and return the affected row count.
    pub async fn execute_update(&mut self, sql: &str) -> Result<i64, QueryError> {
        let result = self.execute(sql).await?.into_row_count().await;
        self.track(result)
    }

    /// Run a query and read all of its rows.
    pub async fn query(&mut self, sql: &str) -> Result<Vec<Row>, QueryError> {
        let rows = self.query_rows(sql).await?;
        let result = rows.collect_rows().await;
        self.track(result)
    }

    /// Run a query and return its rows unread.
    pub async fn query_rows(&mut self, sql: &str) -> Result<Rows, QueryError> {
        self.execute(sql).await?.into_rows()
    }

    /// Prepare a statement for repeated execution.
    pub async fn prepare(&mut self, sql: &str) -> Result<PreparedStatement, QueryError> {
        self.session.ensure_active()?;
        let result = PreparedStatement::prepare(self.context.clone(), sql).await;
        self.track(result)
    }

    /// Switch autocommit off until [`Connection::commit`] or
    /// [`Connection::rollback`].
    pub async fn begin_transaction(&mut self) -> Result<(), QueryError> {
        self.session.ensure_active()?;
        if self.session.in_transaction() {
            return Err(QueryError::InvalidState(
                "Transaction already in progress".to_string(),
            ));
        }

        let result = self.set_autocommit(false).await;
        self.track(result)?;
        self.session.begin_transaction()
    }

    pub async fn commit(&mut self) -> Result<(), QueryError> {
        self.finish_transaction("COMMIT").await
    }

    pub async fn rollback(&mut self) -> Result<(), QueryError> {
        self.finish_transaction("ROLLBACK").await
    }

    async fn finish_transaction(&mut self, sql: &str) -> Result<(), QueryError> {
        self.execute_update(sql).await?;
        if self.session.in_transaction() {
            let result = self.set_autocommit(self.session.config().autocommit).await;
            self.track(result)?;
            self.session.end_transaction()?;
        }
        Ok(())
    }

    async fn set_autocommit(&self, autocommit: bool) -> Result<(), QueryError> {
        debug!(autocommit, "setting autocommit");
        let attributes = Attributes {
            autocommit: Some(autocommit),
            ..Attributes::default()
        };
        self.context
            .run(move |t| Box::pin(async move { t.set_attributes(&attributes).await }))
            .await
    }

    /// Make `schema` the current schema.
    pub async fn set_schema(&mut self, schema: &str) -> Result<(), QueryError> {
        self.execute_update(&format!("OPEN SCHEMA {}", schema))
            .await?;
        self.session.set_current_schema(schema);
        Ok(())
    }

    /// Send `disconnect` and close the socket. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Ok(());
        }
        self.session.mark_closed();

        debug!(host = %self.host, "closing connection");
        let mut transport = self.transport.lock().await;
        transport.close().await?;
        Ok(())
    }

    async fn execute_import(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let host = self.import_host().await?;
        let job = ImportJob::start(sql, host).await?;

        let result = Statement::new(self.context.clone(), job.query())
            .execute()
            .await;
        job.finish().await;
        result
    }

    /// Address the database can reach this client on.
    async fn import_host(&self) -> Result<IpAddr, ImportError> {
        if let Some(host) = &self.params.import_host {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Ok(ip);
            }
            return tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| ImportError::Listener(format!("resolve '{}': {}", host, e)))?
                .next()
                .map(|addr| addr.ip())
                .ok_or_else(|| ImportError::Listener(format!("'{}' has no address", host)));
        }

        self.transport
            .lock()
            .await
            .local_address()
            .map(|addr| addr.ip())
            .ok_or_else(|| {
                ImportError::Listener("local address of the connection is unknown".to_string())
            })
    }

    /// Close the session when `result` says the transport is gone.
    fn track<T>(&mut self, result: Result<T, QueryError>) -> Result<T, QueryError> {
        if let Err(e) = &result {
            if e.is_bad_connection() && !self.is_closed() {
                warn!(host = %self.host, error = %e, "connection lost");
                self.session.mark_closed();
            }
        }
        result
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session.info().session_id)
            .field("host", &self.host)
            .field("port", &self.params.port)
            .field("username", &self.params.username)
            .field("state", &self.session.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionBuilder;
    use crate::error::TransportError;
    use crate::transport::messages::{ColumnInfo, DataType, ResultsResponse};
    use crate::transport::protocol::mock::{session_info, MockTransport};
    use crate::transport::{PreparedStatementHandle, TransportProtocol};
    use serde_json::json;
    use std::io::Write;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    fn params() -> ConnectionParams {
        ConnectionBuilder::new()
            .host("db1")
            .username("sys")
            .password("exasol")
            .result_set_max_rows(100)
            .build()
            .unwrap()
    }

    fn row_count(count: i64) -> ResultsResponse {
        ResultsResponse {
            num_results: 1,
            results: vec![json!({"resultType": "rowCount", "rowCount": count})],
        }
    }

    fn logged_in() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_connect().returning(|_| Ok(()));
        mock.expect_authenticate()
            .returning(|_, _| Ok(session_info()));
        mock
    }

    /// Open a connection on a transport configured by `setup`.
    async fn open(setup: impl Fn(&mut MockTransport) + Send + Sync + 'static) -> Connection {
        // The factory runs once per host; a single host means a single call
        let setup = Mutex::new(Some(setup));
        Connection::open_with(params(), move || -> Box<dyn TransportProtocol> {
            let mut mock = logged_in();
            if let Some(setup) = setup.lock().unwrap().take() {
                setup(&mut mock);
            }
            Box::new(mock)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_reports_session() {
        let connection = open(|_| {}).await;
        assert_eq!(connection.host(), "db1");
        assert_eq!(connection.session_info().database_name, "EXA_DB");
        assert!(!connection.is_closed());
        assert!(format!("{:?}", connection).contains("db1"));
    }

    #[tokio::test]
    async fn test_execute_update_sends_attributes() {
        let mut connection = open(|mock| {
            mock.expect_execute()
                .withf(|sql, attrs| {
                    sql == "DELETE FROM t" && attrs.result_set_max_rows == Some(100)
                })
                .times(1)
                .returning(|_, _| Ok(row_count(7)));
        })
        .await;

        assert_eq!(connection.execute_update("DELETE FROM t").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_query_collects_rows() {
        let mut connection = open(|mock| {
            mock.expect_execute().returning(|_, _| {
                Ok(ResultsResponse {
                    num_results: 1,
                    results: vec![json!({
                        "resultType": "resultSet",
                        "resultSet": {
                            "numColumns": 1,
                            "numRows": 2,
                            "columns": [{"name": "N", "dataType": {"type": "VARCHAR", "size": 5}}],
                            "data": [["x", "y"]]
                        }
                    })],
                })
            });
        })
        .await;

        let rows = connection.query("SELECT n FROM t").await.unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.get(0).unwrap()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_execute_with_prepares_binds_and_closes() {
        let mut connection = open(|mock| {
            mock.expect_create_prepared_statement().returning(|_| {
                Ok(PreparedStatementHandle {
                    handle: 8,
                    parameter_columns: vec![ColumnInfo {
                        name: "ID".to_string(),
                        data_type: DataType {
                            type_name: "DECIMAL".to_string(),
                            precision: Some(18),
                            scale: Some(0),
                            ..Default::default()
                        },
                    }],
                })
            });
            mock.expect_execute_prepared_statement()
                .withf(|cmd| cmd.num_rows == 3 && cmd.data == vec![vec![json!(1), json!(2), json!(3)]])
                .returning(|_| Ok(row_count(3)));
            mock.expect_is_connected().return_const(true);
            mock.expect_close_prepared_statement()
                .times(1)
                .returning(|_| Ok(()));
        })
        .await;

        let result = connection
            .execute_with("INSERT INTO t VALUES (?)", &[1.into(), 2.into(), 3.into()])
            .await
            .unwrap();
        assert_eq!(result.row_count(), Some(3));
    }

    #[tokio::test]
    async fn test_named_parameters_rejected() {
        let mut connection = open(|mock| {
            mock.expect_create_prepared_statement().times(0);
        })
        .await;

        let err = connection
            .execute_named("SELECT ?", vec![NamedParameter::new("id", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NamedParametersNotSupported));
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_bad_connection_closes_session() {
        let mut connection = open(|mock| {
            mock.expect_execute()
                .times(1)
                .returning(|_, _| Err(TransportError::BadConnection));
        })
        .await;

        let err = connection.execute("SELECT 1").await.unwrap_err();
        assert!(err.is_bad_connection());
        assert!(connection.is_closed());

        // No second request reaches the transport
        assert!(matches!(
            connection.execute("SELECT 1").await,
            Err(QueryError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_keeps_session() {
        let mut connection = open(|mock| {
            mock.expect_execute().returning(|_, _| {
                Err(TransportError::ServerException {
                    sql_code: "42000".to_string(),
                    text: "syntax error".to_string(),
                })
            });
        })
        .await;

        assert!(connection.execute("SELEC 1").await.is_err());
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_transaction_toggles_autocommit() {
        let mut connection = open(|mock| {
            let mut seq = mockall::Sequence::new();
            mock.expect_set_attributes()
                .withf(|attrs| attrs.autocommit == Some(false))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
            mock.expect_execute()
                .withf(|sql, _| sql == "COMMIT")
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(row_count(0)));
            mock.expect_set_attributes()
                .withf(|attrs| attrs.autocommit == Some(true))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        })
        .await;

        connection.begin_transaction().await.unwrap();
        assert!(connection.in_transaction());
        assert!(connection.begin_transaction().await.is_err());

        connection.commit().await.unwrap();
        assert!(!connection.in_transaction());
    }

    #[tokio::test]
    async fn test_set_schema() {
        let mut connection = open(|mock| {
            mock.expect_execute()
                .withf(|sql, _| sql == "OPEN SCHEMA RETAIL")
                .returning(|_, _| Ok(row_count(0)));
        })
        .await;

        connection.set_schema("RETAIL").await.unwrap();
        assert_eq!(connection.current_schema(), Some("RETAIL"));
    }

    #[tokio::test]
    async fn test_local_import_is_rewritten() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1,a").unwrap();
        let sql = format!(
            "IMPORT INTO t FROM LOCAL CSV FILE '{}' COLUMN SEPARATOR = ','",
            file.path().display()
        );

        let mut connection = open(|mock| {
            mock.expect_local_address()
                .return_const(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)));
            mock.expect_execute()
                .withf(|sql, _| {
                    sql.starts_with("IMPORT INTO t FROM CSV AT 'http://127.0.0.1:")
                        && sql.ends_with("' FILE 'data.csv' COLUMN SEPARATOR = ','")
                })
                .times(1)
                .returning(|_, _| Ok(row_count(1)));
        })
        .await;

        assert_eq!(connection.execute_update(&sql).await.unwrap(), 1);
    }

    /// Port of the listener a rewritten import points at.
    fn listener_port(sql: &str) -> u16 {
        let (_, rest) = sql.split_once("'http://127.0.0.1:").unwrap();
        let (port, _) = rest.split_once('\'').unwrap();
        port.parse().unwrap()
    }

    fn fetch_import_data(port: u16) -> String {
        use std::io::Read;

        let mut stream = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        write!(
            stream,
            "GET /data.csv HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n"
        )
        .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    /// Payload of a chunked HTTP response.
    fn dechunk(response: &str) -> String {
        let (_, mut rest) = response.split_once("\r\n\r\n").unwrap();
        let mut body = String::new();
        loop {
            let (size, tail) = rest.split_once("\r\n").unwrap();
            let size = usize::from_str_radix(size.trim(), 16).unwrap();
            if size == 0 {
                return body;
            }
            body.push_str(&tail[..size]);
            rest = &tail[size + 2..];
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_local_import_served_while_execute_waits() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "1,a\n2,b").unwrap();
        let sql = format!("IMPORT INTO t FROM LOCAL CSV FILE '{}'", file.path().display());

        let served = Arc::new(Mutex::new(String::new()));
        let seen = Arc::clone(&served);
        let mut connection = open(move |mock| {
            let seen = Arc::clone(&seen);
            mock.expect_local_address()
                .return_const(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)));
            mock.expect_execute().times(1).returning(move |sql, _| {
                // The server pulls the data before it answers
                *seen.lock().unwrap() = fetch_import_data(listener_port(sql));
                Ok(row_count(2))
            });
        })
        .await;

        assert_eq!(connection.execute_update(&sql).await.unwrap(), 2);

        let response = served.lock().unwrap().clone();
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert_eq!(dechunk(&response), "1,a\n2,b\n");
    }

    #[tokio::test]
    async fn test_local_import_listener_stops_after_failed_execute() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1,a").unwrap();
        let sql = format!("IMPORT INTO t FROM LOCAL CSV FILE '{}'", file.path().display());

        let port = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&port);
        let mut connection = open(move |mock| {
            let seen = Arc::clone(&seen);
            mock.expect_local_address()
                .return_const(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)));
            mock.expect_execute().times(1).returning(move |sql, _| {
                *seen.lock().unwrap() = Some(listener_port(sql));
                Err(TransportError::ServerException {
                    sql_code: "42636".to_string(),
                    text: "ETL-5106: file not readable".to_string(),
                })
            });
        })
        .await;

        let err = connection.execute(&sql).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Transport(TransportError::ServerException { .. })
        ));
        assert!(!connection.is_closed());

        let port = port.lock().unwrap().take().unwrap();
        assert!(tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_local_import_missing_file() {
        let mut connection = open(|mock| {
            mock.expect_local_address()
                .return_const(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)));
            mock.expect_execute().times(0);
        })
        .await;

        let err = connection
            .execute("IMPORT INTO t FROM LOCAL CSV FILE './.does_not_exist'")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Import(ImportError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut connection = open(|mock| {
            mock.expect_close().times(1).returning(|| Ok(()));
        })
        .await;

        connection.close().await.unwrap();
        connection.close().await.unwrap();
        assert!(connection.is_closed());
    }
}
