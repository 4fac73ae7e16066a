//! SQL execution interface: open a connection, run statements, read rows.

pub mod connection;
pub mod driver;

pub use connection::Connection;
pub use driver::Driver;
