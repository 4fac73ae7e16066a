//! Shared helpers for tests that need a running Exasol database.
//!
//! Start one with Docker:
//!
//! ```bash
//! docker run -d --name exasol-test -p 8563:8563 --privileged exasol/docker-db:latest
//! ```
//!
//! | Variable          | Default     |
//! |-------------------|-------------|
//! | `EXASOL_HOST`     | localhost   |
//! | `EXASOL_PORT`     | 8563        |
//! | `EXASOL_USER`     | sys         |
//! | `EXASOL_PASSWORD` | exasol      |
//!
//! The tests are `#[ignore]`d; run them with
//! `cargo test --test integration_tests -- --ignored`.

#![allow(dead_code)]

use exasol_wire::{Connection, ConnectionError, Driver};
use std::env;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8563;
pub const DEFAULT_USER: &str = "sys";
pub const DEFAULT_PASSWORD: &str = "exasol";

pub fn get_host() -> String {
    env::var("EXASOL_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string())
}

/// Port from `EXASOL_PORT`; an unparsable value falls back to the default.
pub fn get_port() -> u16 {
    env::var("EXASOL_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

pub fn get_user() -> String {
    env::var("EXASOL_USER").unwrap_or_else(|_| DEFAULT_USER.to_string())
}

pub fn get_password() -> String {
    env::var("EXASOL_PASSWORD").unwrap_or_else(|_| DEFAULT_PASSWORD.to_string())
}

/// DSN for the test database. The Docker image uses a self-signed
/// certificate, so validation is off.
pub fn get_test_connection_string() -> String {
    format!(
        "exasol://{}:{}@{}:{}?validate_certificate=false",
        urlencoding::encode(&get_user()),
        urlencoding::encode(&get_password()),
        get_host(),
        get_port()
    )
}

/// Route driver logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn get_test_connection() -> Result<Connection, ConnectionError> {
    init_tracing();
    Driver::new().open(&get_test_connection_string()).await
}

/// Whether something listens on the configured host and port.
pub fn is_exasol_available() -> bool {
    let addr = format!("{}:{}", get_host(), get_port());
    let Ok(addrs) = addr.to_socket_addrs() else {
        return false;
    };

    addrs
        .into_iter()
        .any(|a| TcpStream::connect_timeout(&a, Duration::from_secs(2)).is_ok())
}

#[macro_export]
macro_rules! skip_if_no_exasol {
    () => {
        if !$crate::common::is_exasol_available() {
            eprintln!(
                "Skipping test: Exasol not available at {}:{}",
                $crate::common::get_host(),
                $crate::common::get_port()
            );
            return;
        }
    };
}

/// Schema name unique to this test run.
pub fn generate_test_schema_name() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock is after the epoch")
        .as_millis();

    format!("TEST_WIRE_{}", millis)
}
