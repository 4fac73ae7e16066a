//! Transient HTTP listener the database pulls local import data from.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tokio::fs::File;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tracing::{debug, warn};

use crate::error::ImportError;

use super::query::{RowSeparator, IMPORT_FILE_NAME};

/// How long [`ImportServer::shutdown`] waits for open requests.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Open a local file named by an import statement.
pub async fn open_file(path: &str) -> Result<File, ImportError> {
    File::open(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ImportError::FileNotFound {
            path: path.to_string(),
        },
        _ => ImportError::Io {
            path: path.to_string(),
            message: e.to_string(),
        },
    })
}

/// The files one import serves, concatenated in order.
///
/// Each line is re-terminated with the declared row separator, so files with
/// LF or CRLF endings are served alike.
#[derive(Debug, Clone)]
pub struct ImportSource {
    files: Vec<PathBuf>,
    separator: RowSeparator,
}

impl ImportSource {
    /// Check that every file can be opened.
    pub async fn open(paths: &[String], separator: RowSeparator) -> Result<Self, ImportError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            open_file(path).await?;
            files.push(PathBuf::from(path));
        }
        Ok(Self { files, separator })
    }

    pub fn separator(&self) -> RowSeparator {
        self.separator
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Body stream over all files; files are opened as the stream reaches them.
    fn body(&self) -> BoxStream<'static, io::Result<Bytes>> {
        let separator = self.separator.as_bytes();
        stream::iter(self.files.clone())
            .then(move |path| async move {
                match File::open(&path).await {
                    Ok(file) => lines(file, separator).boxed(),
                    Err(e) => stream::once(async move { Err(e) }).boxed(),
                }
            })
            .flatten()
            .boxed()
    }
}

/// Lines of `file` split at LF, a trailing CR dropped, each ending in
/// `separator`. A last line without terminator gets one as well.
fn lines(file: File, separator: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> {
    FramedRead::new(file, AnyDelimiterCodec::new(b"\n".to_vec(), Vec::new())).map(move |line| {
        let line = line.map_err(|e| match e {
            AnyDelimiterCodecError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        })?;
        let content = line.strip_suffix(&b"\r"[..]).unwrap_or(&line[..]);

        let mut row = Vec::with_capacity(content.len() + separator.len());
        row.extend_from_slice(content);
        row.extend_from_slice(separator);
        Ok(Bytes::from(row))
    })
}

async fn serve_data(State(source): State<Arc<ImportSource>>) -> Response {
    debug!(files = source.file_count(), "serving import data");
    (
        [(header::CONTENT_TYPE, "text/csv")],
        Body::from_stream(source.body()),
    )
        .into_response()
}

async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

fn router(source: Arc<ImportSource>) -> Router {
    Router::new()
        .route("/", get(serve_data))
        .route(&format!("/{}", IMPORT_FILE_NAME), get(serve_data))
        .fallback(not_found)
        .with_state(source)
}

/// A running import listener.
///
/// [`ImportServer::shutdown`] stops it gracefully. Dropping the guard aborts
/// it, so an error, panic or cancelled future still releases the port.
pub struct ImportServer {
    address: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ImportServer {
    /// Bind an OS-chosen port on `host` and start serving `source`.
    pub async fn start(host: IpAddr, source: ImportSource) -> Result<Self, ImportError> {
        let listener = TcpListener::bind(SocketAddr::new(host, 0))
            .await
            .map_err(|e| ImportError::Listener(format!("bind on {}: {}", host, e)))?;
        let address = listener
            .local_addr()
            .map_err(|e| ImportError::Listener(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(Arc::new(source));

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "import listener failed");
            }
        });

        debug!(%address, "import listener started");
        Ok(Self {
            address,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Stop accepting and wait briefly for transfers in flight.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!(address = %self.address, "import listener did not stop in time");
                task.abort();
            }
        }
        debug!(address = %self.address, "import listener stopped");
    }
}

impl Drop for ImportServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
