//! Per-request plumbing shared by statements and result sets.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::timeout;
use tracing::warn;

use crate::connection::session::SessionConfig;
use crate::error::{QueryError, TransportError};
use crate::transport::messages::Attributes;
use crate::transport::{SharedTransport, TransportProtocol};

/// Transport plus the session settings every request needs.
#[derive(Clone)]
pub struct ExecutionContext {
    transport: SharedTransport,
    attributes: Attributes,
    fetch_size_bytes: u64,
    timeout: Option<Duration>,
}

impl ExecutionContext {
    pub fn new(transport: SharedTransport, config: &SessionConfig) -> Self {
        Self {
            transport,
            attributes: Attributes::with_max_rows(config.result_set_max_rows),
            fetch_size_bytes: config.fetch_size_bytes,
            timeout: config.query_timeout,
        }
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Attributes attached to execute commands.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn fetch_size_bytes(&self) -> u64 {
        self.fetch_size_bytes
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one request with exclusive use of the transport.
    ///
    /// When a query timeout is configured and expires, the request is
    /// abandoned and the transport is invalidated.
    pub async fn run<T, F>(&self, op: F) -> Result<T, QueryError>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut dyn TransportProtocol) -> BoxFuture<'a, Result<T, TransportError>>
            + Send,
    {
        let mut guard = self.transport.lock().await;

        let Some(limit) = self.timeout else {
            return op(&mut **guard).await.map_err(QueryError::from);
        };

        let outcome = timeout(limit, op(&mut **guard)).await;
        match outcome {
            Ok(result) => result.map_err(QueryError::from),
            Err(_) => {
                let timeout_ms = limit.as_millis() as u64;
                warn!(timeout_ms, "request timed out, dropping connection");
                guard.invalidate();
                Err(QueryError::Timeout { timeout_ms })
            }
        }
    }
}
