//! Session state for an open Exasol connection.
//!
//! A [`Session`] records what the server reported at login, the options the
//! client negotiated, and whether the connection is still usable.

use std::fmt;
use std::time::Duration;

use crate::error::QueryError;
use crate::transport::messages::{Attributes, LoginResponseData};

/// Server information returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: u64,
    pub protocol_version: u32,
    pub release_version: String,
    pub database_name: String,
    pub product_name: String,
    /// Maximum size of a single data message in bytes
    pub max_data_message_size: u64,
    pub max_identifier_length: Option<u32>,
    pub max_varchar_length: Option<u64>,
    pub identifier_quote_string: String,
    pub time_zone: Option<String>,
    pub time_zone_behavior: Option<String>,
    /// Whether payloads are zlib-compressed after login
    pub compression_enabled: bool,
}

impl SessionInfo {
    pub(crate) fn from_login(data: LoginResponseData, compression_enabled: bool) -> Self {
        Self {
            session_id: data.session_id,
            protocol_version: data.protocol_version,
            release_version: data.release_version,
            database_name: data.database_name,
            product_name: data.product_name,
            max_data_message_size: data.max_data_message_size,
            max_identifier_length: data.max_identifier_length,
            max_varchar_length: data.max_varchar_length,
            identifier_quote_string: data
                .identifier_quote_string
                .unwrap_or_else(|| "\"".to_string()),
            time_zone: data.time_zone,
            time_zone_behavior: data.time_zone_behavior,
            compression_enabled,
        }
    }
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session {} on {} {} ({})",
            self.session_id, self.product_name, self.release_version, self.database_name
        )
    }
}

/// Client-side options fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Row limit attached to every execute
    pub result_set_max_rows: Option<u64>,
    /// Upper bound for a single fetch reply
    pub fetch_size_bytes: u64,
    /// Client-side bound on every request
    pub query_timeout: Option<Duration>,
    pub autocommit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            result_set_max_rows: None,
            fetch_size_bytes: 2048 * 1024,
            query_timeout: None,
            autocommit: true,
        }
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, autocommit mode
    Ready,
    /// Connected, autocommit switched off until commit or rollback
    InTransaction,
    /// Closed by the client or invalidated by a transport failure
    Closed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }
}

/// An open session.
#[derive(Debug, Clone)]
pub struct Session {
    info: SessionInfo,
    config: SessionConfig,
    state: SessionState,
    current_schema: Option<String>,
}

impl Session {
    pub fn new(info: SessionInfo, config: SessionConfig, schema: Option<String>) -> Self {
        Self {
            info,
            config,
            state: SessionState::Ready,
            current_schema: schema,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_schema(&self) -> Option<&str> {
        self.current_schema.as_deref()
    }

    pub(crate) fn set_current_schema(&mut self, schema: impl Into<String>) {
        self.current_schema = Some(schema.into());
    }

    pub fn in_transaction(&self) -> bool {
        self.state == SessionState::InTransaction
    }

    /// Attributes sent with each execute.
    pub fn execute_attributes(&self) -> Attributes {
        Attributes::with_max_rows(self.config.result_set_max_rows)
    }

    /// Fail unless the session can run statements.
    pub fn ensure_active(&self) -> Result<(), QueryError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(QueryError::InvalidState("Session is closed".to_string()))
        }
    }

    pub(crate) fn begin_transaction(&mut self) -> Result<(), QueryError> {
        self.ensure_active()?;
        if self.in_transaction() {
            return Err(QueryError::InvalidState(
                "Transaction already in progress".to_string(),
            ));
        }
        self.state = SessionState::InTransaction;
        Ok(())
    }

    pub(crate) fn end_transaction(&mut self) -> Result<(), QueryError> {
        self.ensure_active()?;
        if !self.in_transaction() {
            return Err(QueryError::InvalidState(
                "No transaction in progress".to_string(),
            ));
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    pub(crate) fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
    }
}
