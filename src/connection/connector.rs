//! Sequential failover across candidate hosts.
//!
//! Hosts are tried in the order the host specification lists them. The first
//! one that completes the socket handshake and the login wins; the others are
//! never contacted.

use tracing::{debug, info, warn};

use crate::error::{ConnectionError, HostAttempt};
use crate::transport::{TransportProtocol, WebSocketTransport};

use super::params::ConnectionParams;
use super::session::SessionInfo;

/// Creates a fresh, unconnected transport for each host attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn TransportProtocol>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn TransportProtocol> + Send + Sync,
{
    fn create(&self) -> Box<dyn TransportProtocol> {
        self()
    }
}

/// A logged-in transport and the host it reached.
pub struct Established {
    pub transport: Box<dyn TransportProtocol>,
    pub session_info: SessionInfo,
    pub host: String,
}

/// Opens a session against the first reachable host.
pub struct Connector<'a> {
    params: &'a ConnectionParams,
    factory: Box<dyn TransportFactory + 'a>,
}

impl<'a> Connector<'a> {
    /// Connector that speaks WebSocket.
    pub fn new(params: &'a ConnectionParams) -> Self {
        Self::with_factory(params, WebSocketTransport::boxed)
    }

    pub fn with_factory(params: &'a ConnectionParams, factory: impl TransportFactory + 'a) -> Self {
        Self {
            params,
            factory: Box::new(factory),
        }
    }

    /// Try each candidate host until one accepts the login.
    ///
    /// Returns [`ConnectionError::AllHostsFailed`] listing every attempt when
    /// no host succeeds.
    pub async fn connect(&self) -> Result<Established, ConnectionError> {
        let hosts = self.params.hosts()?;
        let credentials = self.params.credentials();
        let options = self.params.login_options();
        let mut attempts = Vec::with_capacity(hosts.len());

        for host in hosts {
            debug!(host = %host, port = self.params.port, "Trying host");

            let mut transport = self.factory.create();
            let transport_params = self.params.transport_params(&host);

            if let Err(e) = transport.connect(&transport_params).await {
                warn!(host = %host, error = %e, "Connection attempt failed");
                attempts.push(self.attempt(&host, e.to_string()));
                continue;
            }

            match transport.authenticate(&credentials, &options).await {
                Ok(session_info) => {
                    info!(
                        host = %host,
                        session_id = session_info.session_id,
                        "Connected to {} {}",
                        session_info.product_name,
                        session_info.release_version
                    );
                    return Ok(Established {
                        transport,
                        session_info,
                        host,
                    });
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "Login failed");
                    transport.invalidate();
                    attempts.push(self.attempt(&host, e.to_string()));
                }
            }
        }

        Err(ConnectionError::AllHostsFailed { attempts })
    }

    fn attempt(&self, host: &str, reason: String) -> HostAttempt {
        HostAttempt {
            host: host.to_string(),
            port: self.params.port,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::params::ConnectionBuilder;
    use crate::error::TransportError;
    use crate::transport::protocol::mock::{session_info, MockTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn params(hosts: &str) -> ConnectionParams {
        ConnectionBuilder::new()
            .host(hosts)
            .username("sys")
            .password("exasol")
            .build()
            .unwrap()
    }

    fn refusing() -> Box<dyn TransportProtocol> {
        let mut mock = MockTransport::new();
        mock.expect_connect()
            .returning(|p| Err(TransportError::IoError(format!("{} refused", p.host))));
        mock.expect_authenticate().times(0);
        Box::new(mock)
    }

    fn healthy(expected_host: &'static str) -> Box<dyn TransportProtocol> {
        let mut mock = MockTransport::new();
        mock.expect_connect()
            .withf(move |p| p.host == expected_host && p.port == 8563)
            .returning(|_| Ok(()));
        mock.expect_authenticate()
            .returning(|_, _| Ok(session_info()));
        Box::new(mock)
    }

    #[tokio::test]
    async fn test_first_host_wins() {
        let params = params("db1,db2");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let connector = Connector::with_factory(&params, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            healthy("db1")
        });

        let established = connector.connect().await.unwrap();
        assert_eq!(established.host, "db1");
        assert_eq!(established.session_info.session_id, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fails_over_in_order() {
        let params = params("exasol1..3");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let connector = Connector::with_factory(&params, move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => refusing(),
                _ => healthy("exasol3"),
            }
        });

        let established = connector.connect().await.unwrap();
        assert_eq!(established.host, "exasol3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_login_failure_advances() {
        let params = params("a,b");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let connector = Connector::with_factory(&params, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                let mut mock = MockTransport::new();
                mock.expect_connect().returning(|_| Ok(()));
                mock.expect_authenticate().returning(|_, _| {
                    Err(TransportError::ServerException {
                        sql_code: "08004".to_string(),
                        text: "bad login".to_string(),
                    })
                });
                mock.expect_invalidate().times(1).return_const(());
                Box::new(mock) as Box<dyn TransportProtocol>
            } else {
                healthy("b")
            }
        });

        assert_eq!(connector.connect().await.unwrap().host, "b");
    }

    #[tokio::test]
    async fn test_all_hosts_failed_lists_attempts() {
        let params = params("n1..2,10.0.0.9");
        let connector = Connector::with_factory(&params, refusing);

        match connector.connect().await {
            Err(ConnectionError::AllHostsFailed { attempts }) => {
                let hosts: Vec<_> = attempts.iter().map(|a| a.host.as_str()).collect();
                assert_eq!(hosts, vec!["n1", "n2", "10.0.0.9"]);
                assert!(attempts[0].reason.contains("n1 refused"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected failure"),
        }
    }
}
