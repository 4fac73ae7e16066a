//! Loading client-local CSV files with `IMPORT ... FROM LOCAL CSV`.
//!
//! The server cannot read files on the client, so the statement is rewritten
//! to fetch `data.csv` over HTTP from a listener this module runs for the
//! duration of the statement.
//!
//! - `query` - recognizing and rewriting import statements
//! - `server` - the transient HTTP listener
//!
//! # Example
//!
//! ```no_run
//! use exasol_wire::import::ImportJob;
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sql = "IMPORT INTO t FROM LOCAL CSV FILE '/tmp/a.csv' FILE '/tmp/b.csv'";
//! let job = ImportJob::start(sql, IpAddr::V4(Ipv4Addr::LOCALHOST)).await?;
//! println!("run instead: {}", job.query());
//! job.finish().await;
//! # Ok(())
//! # }
//! ```

pub mod query;
pub mod server;

use std::net::{IpAddr, SocketAddr};

use tracing::debug;

use crate::error::ImportError;

pub use query::{file_paths, is_import_query, rewrite_import_query, RowSeparator, IMPORT_FILE_NAME};
pub use server::{open_file, ImportServer, ImportSource};

/// A rewritten import statement and the listener serving its files.
///
/// The listener runs until [`ImportJob::finish`] or until the job is dropped.
pub struct ImportJob {
    query: String,
    server: ImportServer,
}

impl ImportJob {
    /// Check the files named by `sql`, start serving them on `host` and
    /// rewrite the statement to point at the listener.
    pub async fn start(sql: &str, host: IpAddr) -> Result<Self, ImportError> {
        let paths = file_paths(sql)?;
        let separator = RowSeparator::from_query(sql);
        let source = ImportSource::open(&paths, separator).await?;
        let server = ImportServer::start(host, source).await?;

        let address = server.address();
        let query = rewrite_import_query(sql, &address.ip().to_string(), address.port());
        debug!(files = paths.len(), %separator, %address, "local import prepared");

        Ok(Self { query, server })
    }

    /// Statement to send to the server.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn address(&self) -> SocketAddr {
        self.server.address()
    }

    /// Stop the listener.
    pub async fn finish(self) {
        self.server.shutdown().await;
    }
}
