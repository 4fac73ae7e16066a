//! Prepared statements and column-major parameter binding.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{QueryError, TransportError};
use crate::transport::messages::{ColumnInfo, ExecutePreparedStatementCommand};
use crate::transport::PreparedStatementHandle;

use super::context::ExecutionContext;
use super::results::{QueryResult, Rows};
use super::statement::{values_from_named, NamedParameter, Parameter};

/// Regroup a flat, row-ordered value list into `columns` column vectors.
///
/// Value `i` lands in column `i % columns`, so `len / columns` rows are bound
/// at once. A list that does not split into whole rows is rejected.
pub fn bind_columns(values: Vec<Value>, columns: usize) -> Result<Vec<Vec<Value>>, QueryError> {
    if columns == 0 {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        return Err(QueryError::InvalidValuesCount {
            values: values.len(),
            columns,
        });
    }

    if values.len() % columns != 0 {
        return Err(QueryError::InvalidValuesCount {
            values: values.len(),
            columns,
        });
    }

    let rows = values.len() / columns;
    let mut data: Vec<Vec<Value>> = (0..columns).map(|_| Vec::with_capacity(rows)).collect();
    for (i, value) in values.into_iter().enumerate() {
        data[i % columns].push(value);
    }
    Ok(data)
}

/// A statement parsed by the server, executable any number of times.
///
/// The server keeps the statement until [`PreparedStatement::close`] is
/// called.
///
/// # Example
///
/// ```no_run
/// # use exasol_wire::query::{ExecutionContext, Parameter, PreparedStatement};
/// # async fn example(context: ExecutionContext) -> Result<(), Box<dyn std::error::Error>> {
/// let mut stmt = PreparedStatement::prepare(context, "INSERT INTO t VALUES (?, ?)").await?;
/// // Two rows in one request
/// let params: Vec<Parameter> = vec![1.into(), "a".into(), 2.into(), "b".into()];
/// stmt.execute_update(&params).await?;
/// stmt.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct PreparedStatement {
    context: ExecutionContext,
    handle: PreparedStatementHandle,
    sql: String,
    closed: bool,
}

impl PreparedStatement {
    /// Ask the server to parse `sql`.
    pub async fn prepare(
        context: ExecutionContext,
        sql: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let sql = sql.into();
        let text = sql.clone();
        let handle = context
            .run(move |t| Box::pin(async move { t.create_prepared_statement(&text).await }))
            .await?;

        debug!(
            handle = handle.handle,
            parameters = handle.parameter_count(),
            "statement prepared"
        );

        Ok(Self {
            context,
            handle,
            sql,
            closed: false,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Server handle of the statement.
    pub fn handle(&self) -> i32 {
        self.handle.handle
    }

    /// Number of parameter columns the server declared.
    pub fn parameter_count(&self) -> usize {
        self.handle.parameter_count()
    }

    pub fn parameter_columns(&self) -> &[ColumnInfo] {
        &self.handle.parameter_columns
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Execute with a flat parameter list holding one or more rows.
    pub async fn execute(&self, params: &[Parameter]) -> Result<QueryResult, QueryError> {
        if self.closed {
            return Err(QueryError::StatementClosed);
        }

        let values = params.iter().map(Parameter::to_json).collect();
        let data = bind_columns(values, self.parameter_count())?;
        let num_rows = data.first().map_or(0, Vec::len);

        let command = ExecutePreparedStatementCommand::new(
            self.handle.handle,
            self.handle.parameter_columns.clone(),
            data,
            num_rows,
            self.context.attributes().clone(),
        );

        debug!(handle = self.handle.handle, num_rows, "executing prepared statement");
        let response = self
            .context
            .run(move |t| Box::pin(async move { t.execute_prepared_statement(&command).await }))
            .await?;

        QueryResult::from_response(&response, &self.context)
    }

    /// Execute with parameters that may carry names; named ones are rejected.
    pub async fn execute_named(
        &self,
        params: Vec<NamedParameter>,
    ) -> Result<QueryResult, QueryError> {
        let values = values_from_named(params)?;
        self.execute(&values).await
    }

    pub async fn execute_update(&self, params: &[Parameter]) -> Result<i64, QueryError> {
        self.execute(params).await?.into_row_count().await
    }

    pub async fn query(&self, params: &[Parameter]) -> Result<Rows, QueryError> {
        self.execute(params).await?.into_rows()
    }

    /// Release the statement on the server. Later calls do nothing.
    ///
    /// On a connection that is already gone this fails with a bad
    /// connection error and sends nothing.
    pub async fn close(&mut self) -> Result<(), QueryError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let handle = self.handle.handle;
        debug!(handle, "closing prepared statement");
        self.context
            .run(move |t| {
                Box::pin(async move {
                    if !t.is_connected() {
                        return Err(TransportError::BadConnection);
                    }
                    t.close_prepared_statement(handle).await
                })
            })
            .await
    }

    /// Hand the server handle to a new owner that will close it.
    pub(crate) fn detach(mut self) -> i32 {
        self.closed = true;
        self.handle.handle
    }
}

impl Drop for PreparedStatement {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                handle = self.handle.handle,
                "prepared statement dropped without close(), server handle leaks"
            );
        }
    }
}
