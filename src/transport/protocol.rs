//! Transport protocol abstraction trait.
//!
//! `TransportProtocol` is the seam between the statement layer and the wire.
//! The WebSocket implementation lives in [`super::websocket`]; tests substitute
//! a mock.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::connection::auth::{Credentials, LoginOptions};
use crate::connection::session::SessionInfo;
use crate::error::TransportError;

use super::messages::{
    Attributes, ColumnInfo, ExecutePreparedStatementCommand, FetchResponseData, ResultSetHandle,
    ResultsResponse,
};

/// Parameters for opening the socket to one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Verify the server certificate and host name
    pub validate_server_certificate: bool,
    /// Connect timeout in milliseconds
    pub timeout_ms: u64,
}

impl TransportParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: true,
            validate_server_certificate: true,
            timeout_ms: 20_000,
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_certificate_validation(mut self, validate: bool) -> Self {
        self.validate_server_certificate = validate;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Build the WebSocket URL from parameters.
    pub fn to_websocket_url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        if self.host.contains(':') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// A statement parsed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatementHandle {
    pub handle: i32,
    /// Declared parameter columns
    pub parameter_columns: Vec<ColumnInfo>,
}

impl PreparedStatementHandle {
    pub fn parameter_count(&self) -> usize {
        self.parameter_columns.len()
    }
}

/// Transport protocol trait for database communication.
///
/// Implementations handle one request at a time; callers share a transport
/// through [`SharedTransport`].
#[async_trait]
pub trait TransportProtocol: Send + Sync {
    /// Open the socket.
    async fn connect(&mut self, params: &TransportParams) -> Result<(), TransportError>;

    /// Log in and negotiate session options.
    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        options: &LoginOptions,
    ) -> Result<SessionInfo, TransportError>;

    /// Execute SQL text without parameters.
    async fn execute(
        &mut self,
        sql: &str,
        attributes: &Attributes,
    ) -> Result<ResultsResponse, TransportError>;

    async fn create_prepared_statement(
        &mut self,
        sql: &str,
    ) -> Result<PreparedStatementHandle, TransportError>;

    async fn execute_prepared_statement(
        &mut self,
        command: &ExecutePreparedStatementCommand,
    ) -> Result<ResultsResponse, TransportError>;

    async fn close_prepared_statement(&mut self, handle: i32) -> Result<(), TransportError>;

    /// Fetch the next page of a result set.
    async fn fetch(
        &mut self,
        handle: ResultSetHandle,
        start_position: u64,
        num_bytes: u64,
    ) -> Result<FetchResponseData, TransportError>;

    async fn close_result_set(&mut self, handle: ResultSetHandle) -> Result<(), TransportError>;

    async fn set_attributes(&mut self, attributes: &Attributes) -> Result<(), TransportError>;

    /// Send `disconnect` and close the socket.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Drop the socket without talking to the server.
    fn invalidate(&mut self);

    fn is_connected(&self) -> bool;

    /// Local end of the socket, used to advertise the import listener.
    fn local_address(&self) -> Option<SocketAddr>;
}

/// Transport shared by a connection and the statements and rows it hands out.
pub type SharedTransport = Arc<Mutex<Box<dyn TransportProtocol>>>;

/// Wrap a transport for sharing.
pub fn shared(transport: Box<dyn TransportProtocol>) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}
