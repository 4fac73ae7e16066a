//! Transport layer for Exasol database communication.
//!
//! # Architecture
//!
//! The transport layer is organized into:
//! - `protocol` - Transport protocol trait definition
//! - `messages` - Protocol message types
//! - `websocket` - WebSocket transport implementation
//! - `compression` - zlib payload compression
//! - `deserialize` - Column-major to row-major transposition
//!
//! # Example
//!
//! ```no_run
//! use exasol_wire::connection::{Credentials, LoginOptions};
//! use exasol_wire::transport::{TransportParams, TransportProtocol, WebSocketTransport};
//! use exasol_wire::transport::messages::Attributes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut transport = WebSocketTransport::new();
//!
//! transport.connect(&TransportParams::new("localhost", 8563)).await?;
//!
//! let credentials = Credentials::new("sys", "exasol");
//! let session = transport
//!     .authenticate(&credentials, &LoginOptions::default())
//!     .await?;
//! println!("Connected to: {}", session.database_name);
//!
//! let response = transport.execute("SELECT 1", &Attributes::default()).await?;
//! println!("{} result(s)", response.num_results);
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod deserialize;
pub mod messages;
pub mod protocol;
pub mod websocket;

pub use messages::{ColumnInfo, DataType, ResultSetHandle};
pub use protocol::{
    shared, PreparedStatementHandle, SharedTransport, TransportParams, TransportProtocol,
};
pub use websocket::{MessageChannel, WebSocketTransport};
