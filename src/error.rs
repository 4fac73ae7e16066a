//! Error types for exasol-wire.
//!
//! This module defines domain-specific error types organized by functional area.
//! Every error maps to a stable [`ErrorCode`] so callers can branch on the kind
//! of failure without matching on message text.

use std::fmt;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum ExasolError {
    /// Connection-related errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Query execution errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Data conversion errors
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Transport protocol errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local file import errors
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// One failed connection attempt against a candidate host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAttempt {
    pub host: String,
    pub port: u16,
    pub reason: String,
}

impl fmt::Display for HostAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.reason)
    }
}

fn join_attempts(attempts: &[HostAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors related to database connections.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish connection to the database
    #[error("Failed to connect to {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// Every candidate host was tried and none accepted the login
    #[error("Failed to connect to any host: {}", join_attempts(.attempts))]
    AllHostsFailed { attempts: Vec<HostAttempt> },

    /// Authentication failure
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid connection parameters
    #[error("Invalid connection parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Connection string parsing error
    #[error("Failed to parse connection string: {0}")]
    ParseError(String),

    /// Host range whose upper bound is below its lower bound
    #[error("invalid host range limits: '{range}'")]
    InvalidHostRange { range: String },

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection is closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Transport failure while talking to the server
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors related to query execution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Parameters were supplied with names
    #[error("named parameters not supported")]
    NamedParametersNotSupported,

    /// Flat parameter list does not split into whole rows
    #[error("invalid argument count: {values} values cannot be bound to {columns} columns")]
    InvalidValuesCount { values: usize, columns: usize },

    /// The server answered with a shape that cannot be a result
    #[error("malformed result: {0}")]
    MalformedData(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Invalid query state
    #[error("Invalid query state: {0}")]
    InvalidState(String),

    /// Result set not available
    #[error("Result set not available: {0}")]
    NoResultSet(String),

    /// Prepared statement has been closed
    #[error("Prepared statement has been closed")]
    StatementClosed,

    /// Unexpected result set when row count was expected
    #[error("Expected row count but received result set")]
    UnexpectedResultSet,

    /// Transport failure, including server-side SQL errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Cell coercion failure
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Local import failure
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Errors related to data type conversion.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Unsupported Exasol type
    #[error("Unsupported Exasol type: {exasol_type}")]
    UnsupportedType { exasol_type: String },

    /// Failed to convert value
    #[error("Failed to convert value at row {row}, column {column}: {message}")]
    ValueConversionFailed {
        row: u64,
        column: usize,
        message: String,
    },

    /// Column index past the end of the row
    #[error("Column index {index} out of bounds for {count} columns")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    /// No column with the requested name
    #[error("Column '{name}' not found")]
    ColumnNotFound { name: String },

    /// NULL read into a non-optional type
    #[error("Unexpected NULL at row {row}, column {column}")]
    UnexpectedNull { row: u64, column: usize },

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

/// Errors related to transport protocol.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection is unusable and must be re-established
    #[error("driver: bad connection")]
    BadConnection,

    /// A request was issued on a session without a socket
    #[error("could not send request '{request}': not connected to server")]
    NotConnected { request: String },

    /// The server rejected the command with an exception
    #[error("execution failed with SQL error code '{sql_code}' and message '{text}'")]
    ServerException { sql_code: String, text: String },

    /// Non-ok status without an exception
    #[error("result status is not 'ok': {status:?}, expected exception in response {envelope}")]
    MalformedResponse { status: String, envelope: String },

    /// Response data did not match the expected shape
    #[error("failed to parse response data {payload:?} into {expected}: {message}")]
    ResponseParse {
        payload: String,
        expected: &'static str,
        message: String,
    },

    /// Message serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Login handshake could not be completed
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Message send error
    #[error("Failed to send message: {0}")]
    SendError(String),

    /// Message receive error
    #[error("Failed to receive message: {0}")]
    ReceiveError(String),

    /// Network I/O error
    #[error("Network I/O error: {0}")]
    IoError(String),

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    TlsError(String),
}

/// Errors raised by the local CSV import bridge.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Statement is not a recognizable import or names no files
    #[error("could not parse import query")]
    InvalidImportQuery,

    /// A referenced local file does not exist
    #[error("file '{path}' not found")]
    FileNotFound { path: String },

    /// Reading a local file failed
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },

    /// The HTTP listener could not be started
    #[error("import listener failed: {0}")]
    Listener(String),
}

/// Stable error codes.
///
/// Numbers are fixed once assigned; the text form is `E-EXW-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Could not reach or log into the server
    Connection = 1,
    /// Credentials rejected or login handshake failed
    Authentication = 2,
    /// Invalid configuration value
    InvalidParameter = 3,
    /// Timeout
    Timeout = 4,
    /// Connection is unusable
    BadConnection = 5,
    /// Non-ok status without exception
    MalformedResponse = 6,
    /// Named parameters supplied
    NamedParameters = 7,
    /// Parameter count is not a multiple of the column count
    InvalidValuesCount = 8,
    /// Result data could not be interpreted
    MalformedData = 9,
    /// Operation not allowed in the current state
    InvalidState = 10,
    /// SQL error reported by the server
    SqlError = 11,
    /// Response data did not match the expected shape
    ResponseParse = 12,
    /// Cell value could not be coerced
    Conversion = 13,
    /// Not an import statement, or no files
    InvalidImportQuery = 14,
    /// Import listener or file I/O failure
    Import = 15,
    /// Request could not be serialized
    Serialization = 16,
    /// Host range upper bound below lower bound
    InvalidHostRange = 20,
    /// Import file missing
    FileNotFound = 28,
    /// Request issued without a socket
    NotConnected = 29,
}

impl ErrorCode {
    /// Numeric part of the code.
    pub fn number(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-EXW-{}", self.number())
    }
}

impl ExasolError {
    /// Stable code identifying the error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ExasolError::Connection(e) => e.code(),
            ExasolError::Query(e) => e.code(),
            ExasolError::Conversion(e) => e.code(),
            ExasolError::Transport(e) => e.code(),
            ExasolError::Import(e) => e.code(),
        }
    }

    /// Whether the session behind this error must be discarded.
    pub fn is_bad_connection(&self) -> bool {
        match self {
            ExasolError::Connection(ConnectionError::Transport(e)) | ExasolError::Transport(e) => {
                e.is_bad_connection()
            }
            ExasolError::Query(e) => e.is_bad_connection(),
            _ => false,
        }
    }
}

impl ConnectionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectionError::AuthenticationFailed(_) => ErrorCode::Authentication,
            ConnectionError::InvalidParameter { .. } | ConnectionError::ParseError(_) => {
                ErrorCode::InvalidParameter
            }
            ConnectionError::InvalidHostRange { .. } => ErrorCode::InvalidHostRange,
            ConnectionError::Timeout { .. } => ErrorCode::Timeout,
            ConnectionError::ConnectionClosed => ErrorCode::BadConnection,
            ConnectionError::Transport(e) => e.code(),
            _ => ErrorCode::Connection,
        }
    }
}

impl QueryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::NamedParametersNotSupported => ErrorCode::NamedParameters,
            QueryError::InvalidValuesCount { .. } => ErrorCode::InvalidValuesCount,
            QueryError::MalformedData(_) => ErrorCode::MalformedData,
            QueryError::Timeout { .. } => ErrorCode::Timeout,
            QueryError::Transport(e) => e.code(),
            QueryError::Conversion(e) => e.code(),
            QueryError::Import(e) => e.code(),
            _ => ErrorCode::InvalidState,
        }
    }

    /// Whether the session behind this error must be discarded.
    ///
    /// A timeout abandons the in-flight request, so it counts as well.
    pub fn is_bad_connection(&self) -> bool {
        match self {
            QueryError::Transport(e) => e.is_bad_connection(),
            QueryError::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl ConversionError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Conversion
    }
}

impl TransportError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::NotConnected { .. } => ErrorCode::NotConnected,
            TransportError::ServerException { .. } => ErrorCode::SqlError,
            TransportError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            TransportError::ResponseParse { .. } => ErrorCode::ResponseParse,
            TransportError::SerializationError(_) => ErrorCode::Serialization,
            TransportError::Authentication(_) => ErrorCode::Authentication,
            _ => ErrorCode::BadConnection,
        }
    }

    /// Whether the session that produced this error must be discarded.
    ///
    /// Server exceptions and response-shape errors leave the session usable.
    pub fn is_bad_connection(&self) -> bool {
        self.code() == ErrorCode::BadConnection || self.code() == ErrorCode::NotConnected
    }
}

impl ImportError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ImportError::InvalidImportQuery => ErrorCode::InvalidImportQuery,
            ImportError::FileNotFound { .. } => ErrorCode::FileNotFound,
            ImportError::Io { .. } | ImportError::Listener(_) => ErrorCode::Import,
        }
    }
}

// Conversions from external error types
impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::SerializationError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocketError(err.to_string())
    }
}
