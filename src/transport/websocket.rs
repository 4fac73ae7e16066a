//! WebSocket transport implementation for Exasol.
//!
//! Each command is one JSON message and is answered by exactly one reply.
//! Any failure below the JSON level (socket write or read, a close frame,
//! undecodable zlib data, an unparseable envelope) leaves the socket in an
//! unknown state, so the transport drops it and reports
//! [`TransportError::BadConnection`]. Server exceptions and unexpected
//! response shapes only fail the current request.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::connection::auth::{AuthenticationHandler, Credentials, LoginOptions};
use crate::connection::session::SessionInfo;
use crate::error::TransportError;

use super::compression;
use super::messages::{
    Attributes, ClosePreparedStatementCommand, CloseResultSetCommand,
    CreatePreparedStatementCommand, DisconnectCommand, ExecuteCommand,
    ExecutePreparedStatementCommand, FetchCommand, FetchResponseData, LoginResponseData,
    PreparedStatementResponse, PublicKeyResponse, ResponseEnvelope, ResultSetHandle,
    ResultsResponse, SetAttributesCommand,
};
use super::protocol::{PreparedStatementHandle, TransportParams, TransportProtocol};

/// WebSocket over plain TCP or TLS.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frame-level access to the socket.
///
/// Implemented for [`WsStream`]; tests substitute a mock.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn write_message(&mut self, message: Message) -> Result<(), TransportError>;

    /// Next data or close frame. Ping and pong frames are skipped.
    async fn read_message(&mut self) -> Result<Message, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl MessageChannel for WsStream {
    async fn write_message(&mut self, message: Message) -> Result<(), TransportError> {
        self.send(message)
            .await
            .map_err(|e| TransportError::SendError(e.to_string()))
    }

    async fn read_message(&mut self) -> Result<Message, TransportError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(message)) => return Ok(message),
                Some(Err(e)) => return Err(TransportError::ReceiveError(e.to_string())),
                None => {
                    return Err(TransportError::ReceiveError(
                        "Connection closed".to_string(),
                    ))
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        WebSocketStream::close(self, None)
            .await
            .map_err(TransportError::from)
    }
}

/// Connection state tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connected but not authenticated
    Connected,
    /// Connected and authenticated
    Authenticated,
    /// Closed or invalidated
    Closed,
}

/// WebSocket transport implementation.
pub struct WebSocketTransport {
    /// Socket (None if not connected or torn down)
    channel: Option<Box<dyn MessageChannel>>,
    /// Current session information (None if not authenticated)
    session_info: Option<SessionInfo>,
    state: ConnectionState,
    /// zlib payloads, switched on after login
    compression: bool,
    /// Set while a request awaits its reply; still set if that wait was abandoned
    in_flight: bool,
    local_addr: Option<SocketAddr>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        Self {
            channel: None,
            session_info: None,
            state: ConnectionState::Disconnected,
            compression: false,
            in_flight: false,
            local_addr: None,
        }
    }

    /// New transport, boxed for [`crate::transport::SharedTransport`].
    pub fn boxed() -> Box<dyn TransportProtocol> {
        Box::new(Self::new())
    }

    /// Transport over an already open channel.
    pub fn from_channel(channel: Box<dyn MessageChannel>, compression: bool) -> Self {
        Self {
            channel: Some(channel),
            state: ConnectionState::Connected,
            compression,
            ..Self::new()
        }
    }

    /// Session reported by the last successful login.
    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session_info.as_ref()
    }

    /// Send a command and decode its `responseData` into `R`.
    pub async fn request<C, R>(&mut self, command: &C) -> Result<R, TransportError>
    where
        C: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let data = self.exchange(command).await?.unwrap_or(Value::Null);

        R::deserialize(&data).map_err(|e| TransportError::ResponseParse {
            payload: data.to_string(),
            expected: std::any::type_name::<R>(),
            message: e.to_string(),
        })
    }

    /// Send a command whose `responseData` is not needed.
    pub async fn send<C>(&mut self, command: &C) -> Result<(), TransportError>
    where
        C: Serialize + ?Sized,
    {
        self.exchange(command).await.map(|_| ())
    }

    /// One request/response cycle. Returns the reply's `responseData`.
    async fn exchange<C>(&mut self, command: &C) -> Result<Option<Value>, TransportError>
    where
        C: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(command)?;

        if self.in_flight {
            warn!("previous request was abandoned mid-flight, dropping connection");
            self.teardown();
            return Err(TransportError::BadConnection);
        }

        let compression = self.compression;
        let Some(channel) = self.channel.as_mut() else {
            return Err(TransportError::NotConnected { request: payload });
        };

        trace!(bytes = payload.len(), compression, "sending request");
        self.in_flight = true;
        let reply = match round_trip(channel.as_mut(), payload, compression).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "transport failure, dropping connection");
                self.teardown();
                return Err(TransportError::BadConnection);
            }
        };
        self.in_flight = false;
        trace!(bytes = reply.len(), "received reply");

        let envelope: ResponseEnvelope = match serde_json::from_slice(&reply) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "undecodable reply envelope, dropping connection");
                self.teardown();
                return Err(TransportError::BadConnection);
            }
        };

        check_status(envelope, &reply)
    }

    fn teardown(&mut self) {
        self.channel = None;
        self.session_info = None;
        self.in_flight = false;
        self.state = ConnectionState::Closed;
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one frame and read the one reply, as raw JSON bytes.
async fn round_trip(
    channel: &mut dyn MessageChannel,
    payload: String,
    compression: bool,
) -> Result<Vec<u8>, TransportError> {
    let frame = if compression {
        let compressed = compression::compress(payload.as_bytes())
            .map_err(|e| TransportError::IoError(e.to_string()))?;
        Message::Binary(compressed)
    } else {
        Message::Text(payload)
    };

    channel.write_message(frame).await?;

    let bytes = match channel.read_message().await? {
        Message::Text(text) => text.into_bytes(),
        Message::Binary(bytes) => bytes,
        Message::Close(frame) => {
            return Err(TransportError::ReceiveError(format!(
                "server closed the connection: {:?}",
                frame
            )))
        }
        other => {
            return Err(TransportError::ReceiveError(format!(
                "unexpected frame: {:?}",
                other
            )))
        }
    };

    if compression {
        compression::decompress(&bytes).map_err(|e| TransportError::IoError(e.to_string()))
    } else {
        Ok(bytes)
    }
}

/// Turn a non-ok envelope into the matching error.
fn check_status(envelope: ResponseEnvelope, raw: &[u8]) -> Result<Option<Value>, TransportError> {
    if envelope.status == "ok" {
        return Ok(envelope.response_data);
    }

    match envelope.exception {
        Some(exception) => Err(TransportError::ServerException {
            sql_code: exception.sql_code.unwrap_or_default(),
            text: exception.text,
        }),
        None => Err(TransportError::MalformedResponse {
            status: envelope.status,
            envelope: String::from_utf8_lossy(raw).into_owned(),
        }),
    }
}

fn tls_connector(validate_certificate: bool) -> Result<Connector, TransportError> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(!validate_certificate)
        .danger_accept_invalid_hostnames(!validate_certificate)
        .build()
        .map_err(|e| TransportError::TlsError(e.to_string()))?;
    Ok(Connector::NativeTls(connector))
}

#[async_trait]
impl TransportProtocol for WebSocketTransport {
    async fn connect(&mut self, params: &TransportParams) -> Result<(), TransportError> {
        if self.state != ConnectionState::Disconnected {
            return Err(TransportError::WebSocketError(
                "Already connected".to_string(),
            ));
        }

        let timeout = Duration::from_millis(params.timeout_ms);
        let timed_out =
            || TransportError::IoError(format!("Connection timeout after {}ms", params.timeout_ms));

        debug!(host = %params.host, port = params.port, tls = params.use_tls, "opening socket");
        let tcp = tokio::time::timeout(timeout, TcpStream::connect((params.host.as_str(), params.port)))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| TransportError::IoError(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| TransportError::IoError(e.to_string()))?;
        let local_addr = tcp.local_addr().ok();

        let connector = if params.use_tls {
            tls_connector(params.validate_server_certificate)?
        } else {
            Connector::Plain
        };

        let (ws_stream, _) = tokio::time::timeout(
            timeout,
            client_async_tls_with_config(params.to_websocket_url(), tcp, None, Some(connector)),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| match e {
            tungstenite::Error::Tls(e) => TransportError::TlsError(e.to_string()),
            other => TransportError::from(other),
        })?;

        self.channel = Some(Box::new(ws_stream));
        self.local_addr = local_addr;
        self.state = ConnectionState::Connected;

        Ok(())
    }

    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        options: &LoginOptions,
    ) -> Result<SessionInfo, TransportError> {
        if self.state == ConnectionState::Authenticated {
            return Err(TransportError::Authentication(
                "Already authenticated".to_string(),
            ));
        }

        let handler = AuthenticationHandler::new(credentials, options);

        let auth = if credentials.uses_password() {
            let key: PublicKeyResponse = self.request(&handler.login_command()).await?;
            handler.auth_command(Some(&key))?
        } else {
            self.send(&handler.login_command()).await?;
            handler.auth_command(None)?
        };

        let data: LoginResponseData = self.request(&auth).await?;

        // Everything after a successful login is compressed if requested
        self.compression = options.use_compression;
        let session_info = SessionInfo::from_login(data, options.use_compression);
        debug!(session_id = session_info.session_id, "authenticated");

        self.session_info = Some(session_info.clone());
        self.state = ConnectionState::Authenticated;

        Ok(session_info)
    }

    async fn execute(
        &mut self,
        sql: &str,
        attributes: &Attributes,
    ) -> Result<ResultsResponse, TransportError> {
        debug!(sql_len = sql.len(), "execute");
        self.request(&ExecuteCommand::new(sql, attributes.clone()))
            .await
    }

    async fn create_prepared_statement(
        &mut self,
        sql: &str,
    ) -> Result<PreparedStatementHandle, TransportError> {
        let response: PreparedStatementResponse = self
            .request(&CreatePreparedStatementCommand::new(sql))
            .await?;

        debug!(handle = response.statement_handle, "prepared statement created");
        Ok(PreparedStatementHandle {
            handle: response.statement_handle,
            parameter_columns: response
                .parameter_data
                .map(|p| p.columns)
                .unwrap_or_default(),
        })
    }

    async fn execute_prepared_statement(
        &mut self,
        command: &ExecutePreparedStatementCommand,
    ) -> Result<ResultsResponse, TransportError> {
        debug!(
            handle = command.statement_handle,
            rows = command.num_rows,
            "execute prepared statement"
        );
        self.request(command).await
    }

    async fn close_prepared_statement(&mut self, handle: i32) -> Result<(), TransportError> {
        debug!(handle, "close prepared statement");
        self.send(&ClosePreparedStatementCommand::new(handle)).await
    }

    async fn fetch(
        &mut self,
        handle: ResultSetHandle,
        start_position: u64,
        num_bytes: u64,
    ) -> Result<FetchResponseData, TransportError> {
        debug!(handle = handle.as_i32(), start_position, "fetch");
        self.request(&FetchCommand::new(handle.as_i32(), start_position, num_bytes))
            .await
    }

    async fn close_result_set(&mut self, handle: ResultSetHandle) -> Result<(), TransportError> {
        self.send(&CloseResultSetCommand::new(vec![handle.as_i32()]))
            .await
    }

    async fn set_attributes(&mut self, attributes: &Attributes) -> Result<(), TransportError> {
        self.send(&SetAttributesCommand::new(attributes.clone()))
            .await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.channel.is_none() {
            self.state = ConnectionState::Closed;
            return Ok(());
        }

        let disconnected = if self.state == ConnectionState::Authenticated {
            self.send(&DisconnectCommand::default()).await
        } else {
            Ok(())
        };

        if let Some(mut channel) = self.channel.take() {
            // The server may already have dropped the socket after disconnect
            let _ = channel.close().await;
        }
        self.teardown();
        debug!("connection closed");

        disconnected
    }

    fn invalidate(&mut self) {
        if self.channel.is_some() {
            warn!("invalidating connection");
        }
        self.teardown();
    }

    fn is_connected(&self) -> bool {
        self.channel.is_some()
            && matches!(
                self.state,
                ConnectionState::Connected | ConnectionState::Authenticated
            )
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::transport::messages::{LoginCommand, PROTOCOL_VERSION};
    use mockall::mock;

    mock! {
        pub Channel {}

        #[async_trait]
        impl MessageChannel for Channel {
            async fn write_message(&mut self, message: Message) -> Result<(), TransportError>;
            async fn read_message(&mut self) -> Result<Message, TransportError>;
            async fn close(&mut self) -> Result<(), TransportError>;
        }
    }

    const LOGIN_JSON: &str = r#"{"command":"login","protocolVersion":3,"attributes":{}}"#;

    fn login() -> LoginCommand {
        LoginCommand::new(PROTOCOL_VERSION)
    }

    fn replying(reply: &'static str) -> MockChannel {
        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .times(1)
            .returning(|_| Ok(()));
        channel
            .expect_read_message()
            .times(1)
            .returning(move || Ok(Message::Text(reply.to_string())));
        channel
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .withf(|m| matches!(m, Message::Text(t) if t == LOGIN_JSON))
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_read_message().times(1).returning(|| {
            Ok(Message::Text(
                r#"{"status":"ok","responseData":{"publicKeyPem":"pem"}}"#.to_string(),
            ))
        });

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let response: PublicKeyResponse = transport.request(&login()).await.unwrap();

        assert_eq!(response.public_key_pem, "pem");
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_success_with_compression() {
        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .withf(|m| match m {
                Message::Binary(bytes) => {
                    compression::decompress(bytes).unwrap() == LOGIN_JSON.as_bytes()
                }
                _ => false,
            })
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_read_message().times(1).returning(|| {
            let reply = br#"{"status":"ok","responseData":{"publicKeyPem":"pem"}}"#;
            Ok(Message::Binary(compression::compress(reply).unwrap()))
        });

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), true);
        let response: PublicKeyResponse = transport.request(&login()).await.unwrap();

        assert_eq!(response.public_key_pem, "pem");
    }

    #[tokio::test]
    async fn test_invalid_compressed_reply_is_bad_connection() {
        let mut channel = MockChannel::new();
        channel.expect_write_message().returning(|_| Ok(()));
        channel
            .expect_read_message()
            .returning(|| Ok(Message::Text("invalid zlib content".to_string())));

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), true);
        let err = transport
            .request::<_, PublicKeyResponse>(&login())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::BadConnection));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_without_response_target() {
        let channel = replying(r#"{"status":"ok","responseData":{"publicKeyPem":"pem"}}"#);

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        transport.send(&login()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_fails_when_not_connected() {
        let mut transport = WebSocketTransport::new();

        let err = transport
            .request::<_, PublicKeyResponse>(&login())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "could not send request '{}': not connected to server",
                LOGIN_JSON
            )
        );
        assert_eq!(err.code(), ErrorCode::NotConnected);
        assert!(err.is_bad_connection());
    }

    #[tokio::test]
    async fn test_write_failure_is_bad_connection() {
        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .times(1)
            .returning(|_| Err(TransportError::SendError("broken pipe".to_string())));
        channel.expect_read_message().times(0);

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport
            .request::<_, PublicKeyResponse>(&login())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::BadConnection));
        assert!(!transport.is_connected());

        // The torn-down session refuses further requests without I/O
        let err = transport.send(&login()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_read_failure_is_bad_connection() {
        let mut channel = MockChannel::new();
        channel.expect_write_message().returning(|_| Ok(()));
        channel
            .expect_read_message()
            .returning(|| Err(TransportError::ReceiveError("reset".to_string())));

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport.send(&login()).await.unwrap_err();

        assert!(matches!(err, TransportError::BadConnection));
    }

    #[tokio::test]
    async fn test_close_frame_is_bad_connection() {
        let mut channel = MockChannel::new();
        channel.expect_write_message().returning(|_| Ok(()));
        channel
            .expect_read_message()
            .returning(|| Ok(Message::Close(None)));

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport.send(&login()).await.unwrap_err();

        assert!(matches!(err, TransportError::BadConnection));
    }

    #[tokio::test]
    async fn test_invalid_json_reply_is_bad_connection() {
        let channel = replying("invalid json");

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport.send(&login()).await.unwrap_err();

        assert!(matches!(err, TransportError::BadConnection));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_server_exception_keeps_session() {
        let channel = replying(
            r#"{"status":"error","exception":{"sqlCode":"mock sql code","text":"mock error"}}"#,
        );

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport.send(&login()).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "execution failed with SQL error code 'mock sql code' and message 'mock error'"
        );
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_non_ok_without_exception() {
        let channel = replying(r#"{"status":"notok"}"#);

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport.send(&login()).await.unwrap_err();

        assert!(matches!(err, TransportError::MalformedResponse { .. }));
        let msg = err.to_string();
        assert!(msg.starts_with(r#"result status is not 'ok': "notok", expected exception in response"#));
        assert!(msg.contains(r#"{"status":"notok"}"#));
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_response_data_parse_failure() {
        let channel = replying(r#"{"status":"ok","responseData":"invalid"}"#);

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let err = transport
            .request::<_, PublicKeyResponse>(&login())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::ResponseParse { .. }));
        assert!(err
            .to_string()
            .starts_with(r#"failed to parse response data "\"invalid\"" into"#));
        assert!(err.to_string().contains("PublicKeyResponse"));
    }

    #[tokio::test]
    async fn test_abandoned_request_poisons_session() {
        let mut channel = MockChannel::new();
        channel.expect_write_message().times(0);

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        // A request future dropped while awaiting its reply leaves this set
        transport.in_flight = true;

        let err = transport.send(&login()).await.unwrap_err();
        assert!(matches!(err, TransportError::BadConnection));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_authenticate_with_password_enables_compression() {
        use rsa::pkcs1::{EncodeRsaPublicKey, LineEnding};
        use rsa::{RsaPrivateKey, RsaPublicKey};

        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let pem = RsaPublicKey::from(&private)
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();

        let key_reply = serde_json::json!({
            "status": "ok",
            "responseData": { "publicKeyPem": pem, "publicKeyModulus": "", "publicKeyExponent": "" }
        })
        .to_string();
        let login_reply = serde_json::json!({
            "status": "ok",
            "responseData": {
                "sessionId": 77,
                "protocolVersion": 3,
                "releaseVersion": "8.29.1",
                "databaseName": "EXA_DB",
                "productName": "Exasol",
                "maxDataMessageSize": 1024
            }
        })
        .to_string();
        let mut replies = vec![key_reply, login_reply].into_iter();

        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .times(2)
            .returning(|m| match m {
                Message::Text(_) => Ok(()),
                _ => panic!("login must not be compressed"),
            });
        channel
            .expect_read_message()
            .times(2)
            .returning(move || Ok(Message::Text(replies.next().unwrap())));

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let options = LoginOptions {
            use_compression: true,
            ..LoginOptions::default()
        };
        let info = transport
            .authenticate(&Credentials::new("sys", "exasol"), &options)
            .await
            .unwrap();

        assert_eq!(info.session_id, 77);
        assert!(info.compression_enabled);
        assert!(transport.compression);
        assert_eq!(transport.state, ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_fetch_decodes_rows() {
        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .withf(|m| {
                matches!(m, Message::Text(t)
                    if t == r#"{"command":"fetch","resultSetHandle":5,"startPosition":2,"numBytes":1024}"#)
            })
            .returning(|_| Ok(()));
        channel.expect_read_message().returning(|| {
            Ok(Message::Text(
                r#"{"status":"ok","responseData":{"numRows":2,"data":[[3,4],["c","d"]]}}"#
                    .to_string(),
            ))
        });

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        let page = transport
            .fetch(ResultSetHandle::new(5), 2, 1024)
            .await
            .unwrap();

        assert_eq!(page.num_rows, 2);
        assert_eq!(page.data[1], vec![serde_json::json!(4), serde_json::json!("d")]);
    }

    #[tokio::test]
    async fn test_close_sends_disconnect_when_authenticated() {
        let mut channel = MockChannel::new();
        channel
            .expect_write_message()
            .withf(|m| matches!(m, Message::Text(t) if t == r#"{"command":"disconnect"}"#))
            .times(1)
            .returning(|_| Ok(()));
        channel
            .expect_read_message()
            .returning(|| Ok(Message::Text(r#"{"status":"ok"}"#.to_string())));
        channel.expect_close().times(1).returning(|| Ok(()));

        let mut transport = WebSocketTransport::from_channel(Box::new(channel), false);
        transport.state = ConnectionState::Authenticated;

        transport.close().await.unwrap();
        assert!(!transport.is_connected());

        // Closing twice is harmless
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_requires_disconnected_state() {
        let mut transport = WebSocketTransport::new();
        transport.state = ConnectionState::Connected;

        let params = TransportParams::new("localhost", 8563);
        let result = transport.connect(&params).await;

        assert!(matches!(result, Err(TransportError::WebSocketError(_))));
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = WebSocketTransport::default();
        assert!(!transport.is_connected());
        assert!(transport.local_address().is_none());
    }
}
