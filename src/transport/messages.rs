//! WebSocket message types for the Exasol protocol.
//!
//! Every request is a single JSON object; commands carry a `command` field.
//! Every reply is wrapped in a [`ResponseEnvelope`] whose `responseData` is
//! decoded into one of the response types below once the status is checked.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::deserialize::{to_row_major, to_row_major_option};

/// WebSocket protocol version requested at login.
pub const PROTOCOL_VERSION: u32 = 3;

/// Session attributes sent with commands.
///
/// Unset attributes are omitted from the request, so the server keeps its
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocommit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_schema: Option<String>,
    /// Query timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_set_max_rows: Option<u64>,
}

impl Attributes {
    /// Attributes carrying only a result row limit.
    pub fn with_max_rows(max_rows: Option<u64>) -> Self {
        Self {
            result_set_max_rows: max_rows,
            ..Self::default()
        }
    }
}

/// First login step: asks for the server's public key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCommand {
    pub command: &'static str,
    pub protocol_version: u32,
    pub attributes: Attributes,
}

impl LoginCommand {
    /// Password login.
    pub fn new(protocol_version: u32) -> Self {
        Self {
            command: "login",
            protocol_version,
            attributes: Attributes::default(),
        }
    }

    /// Token login (OpenID access or refresh token).
    pub fn token(protocol_version: u32) -> Self {
        Self {
            command: "loginToken",
            ..Self::new(protocol_version)
        }
    }
}

/// Public key returned by the first login step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key_pem: String,
    #[serde(default)]
    pub public_key_modulus: String,
    #[serde(default)]
    pub public_key_exponent: String,
}

/// Second login step: credentials plus client identification.
///
/// Exactly one of `password`, `access_token` or `refresh_token` is set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Base64 of the RSA-encrypted password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub use_compression: bool,
    pub client_name: String,
    pub driver_name: String,
    pub client_os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_os_username: Option<String>,
    pub client_version: String,
    pub client_runtime: String,
    pub attributes: Attributes,
}

/// Session data returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub session_id: u64,
    pub protocol_version: u32,
    pub release_version: String,
    pub database_name: String,
    pub product_name: String,
    pub max_data_message_size: u64,
    #[serde(default)]
    pub max_identifier_length: Option<u32>,
    #[serde(default)]
    pub max_varchar_length: Option<u64>,
    #[serde(default)]
    pub identifier_quote_string: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub time_zone_behavior: Option<String>,
}

/// Execute SQL text directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCommand {
    pub command: &'static str,
    pub sql_text: String,
    pub attributes: Attributes,
}

impl ExecuteCommand {
    pub fn new(sql: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            command: "execute",
            sql_text: sql.into(),
            attributes,
        }
    }
}

/// Ask the server to parse a statement and return a handle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreparedStatementCommand {
    pub command: &'static str,
    pub sql_text: String,
    pub attributes: Attributes,
}

impl CreatePreparedStatementCommand {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            command: "createPreparedStatement",
            sql_text: sql.into(),
            attributes: Attributes::default(),
        }
    }
}

/// Reply to `createPreparedStatement`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedStatementResponse {
    pub statement_handle: i32,
    #[serde(default)]
    pub parameter_data: Option<ParameterData>,
    #[serde(default)]
    pub num_results: usize,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// Declared parameter columns of a prepared statement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterData {
    pub num_columns: usize,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// Execute a prepared statement with column-major parameter data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePreparedStatementCommand {
    pub command: &'static str,
    pub statement_handle: i32,
    pub num_columns: usize,
    pub num_rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub data: Vec<Vec<Value>>,
    pub attributes: Attributes,
}

impl ExecutePreparedStatementCommand {
    pub fn new(
        statement_handle: i32,
        columns: Vec<ColumnInfo>,
        data: Vec<Vec<Value>>,
        num_rows: usize,
        attributes: Attributes,
    ) -> Self {
        Self {
            command: "executePreparedStatement",
            statement_handle,
            num_columns: columns.len(),
            num_rows,
            columns,
            data,
            attributes,
        }
    }
}

/// Release a prepared statement on the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePreparedStatementCommand {
    pub command: &'static str,
    pub statement_handle: i32,
}

impl ClosePreparedStatementCommand {
    pub fn new(statement_handle: i32) -> Self {
        Self {
            command: "closePreparedStatement",
            statement_handle,
        }
    }
}

/// Reply to `execute` and `executePreparedStatement`.
///
/// Each entry of `results` is decoded lazily by the result decoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub num_results: usize,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// One logical result, discriminated by `resultType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "resultType")]
pub enum ResultPayload {
    #[serde(rename = "rowCount")]
    RowCount(RowCountData),
    #[serde(rename = "resultSet")]
    ResultSet(ResultSetEnvelope),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowCountData {
    pub row_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetEnvelope {
    pub result_set: ResultSetData,
}

/// Result set metadata plus the first batch of rows.
///
/// `result_set_handle` is only present when more rows remain on the server
/// than were included in this message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetData {
    #[serde(default)]
    pub result_set_handle: Option<i32>,
    pub num_columns: usize,
    pub num_rows: u64,
    #[serde(default)]
    pub num_rows_in_message: u64,
    pub columns: Vec<ColumnInfo>,
    /// Row-major after decoding
    #[serde(default, deserialize_with = "to_row_major_option")]
    pub data: Option<Vec<Vec<Value>>>,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

/// Exasol data type descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataType {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_local_time_zone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srid: Option<u32>,
}

/// Fetch the next page of a server-side result set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchCommand {
    pub command: &'static str,
    pub result_set_handle: i32,
    /// 0-based row offset
    pub start_position: u64,
    /// Upper bound for the reply size
    pub num_bytes: u64,
}

impl FetchCommand {
    pub fn new(result_set_handle: i32, start_position: u64, num_bytes: u64) -> Self {
        Self {
            command: "fetch",
            result_set_handle,
            start_position,
            num_bytes,
        }
    }
}

/// Reply to `fetch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponseData {
    pub num_rows: u64,
    #[serde(deserialize_with = "to_row_major")]
    pub data: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResultSetCommand {
    pub command: &'static str,
    pub result_set_handles: Vec<i32>,
}

impl CloseResultSetCommand {
    pub fn new(handles: Vec<i32>) -> Self {
        Self {
            command: "closeResultSet",
            result_set_handles: handles,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAttributesCommand {
    pub command: &'static str,
    pub attributes: Attributes,
}

impl SetAttributesCommand {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            command: "setAttributes",
            attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DisconnectCommand {
    pub command: &'static str,
}

impl Default for DisconnectCommand {
    fn default() -> Self {
        Self {
            command: "disconnect",
        }
    }
}

/// Reply wrapper shared by every command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status: String,
    #[serde(default)]
    pub response_data: Option<Value>,
    #[serde(default)]
    pub exception: Option<ExceptionInfo>,
}

/// Exception information from Exasol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    #[serde(default)]
    pub sql_code: Option<String>,
    pub text: String,
}

/// Server-side result set cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultSetHandle(pub i32);

impl ResultSetHandle {
    pub fn new(handle: i32) -> Self {
        Self(handle)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl From<i32> for ResultSetHandle {
    fn from(handle: i32) -> Self {
        Self(handle)
    }
}
