//! Authentication handling for Exasol connections.
//!
//! Passwords never travel in clear text: the server hands out an RSA public
//! key in the first login step and the password is sent encrypted with it
//! (PKCS#1 v1.5, base64). Token logins skip the key exchange.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::error::TransportError;
use crate::transport::messages::{
    Attributes, AuthCommand, LoginCommand, PublicKeyResponse, PROTOCOL_VERSION,
};

/// Driver name reported to the server.
pub const DRIVER_NAME: &str = "exasol-wire";

/// Secure credentials container.
///
/// Secrets are never printed by `Debug` or `Display`.
#[derive(Clone)]
pub enum Credentials {
    /// Username and password
    Password {
        username: String,
        password: Arc<SecureString>,
    },
    /// OpenID access token
    AccessToken(Arc<SecureString>),
    /// OpenID refresh token
    RefreshToken(Arc<SecureString>),
}

impl Credentials {
    /// Username/password credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            username: username.into(),
            password: Arc::new(SecureString::new(password.into())),
        }
    }

    pub fn access_token(token: impl Into<String>) -> Self {
        Credentials::AccessToken(Arc::new(SecureString::new(token.into())))
    }

    pub fn refresh_token(token: impl Into<String>) -> Self {
        Credentials::RefreshToken(Arc::new(SecureString::new(token.into())))
    }

    /// Username, if this is a password login.
    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::Password { username, .. } => Some(username),
            _ => None,
        }
    }

    /// Whether the login needs the public-key exchange first.
    pub fn uses_password(&self) -> bool {
        matches!(self, Credentials::Password { .. })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::AccessToken(_) => write!(f, "Credentials(access_token: <redacted>)"),
            Credentials::RefreshToken(_) => write!(f, "Credentials(refresh_token: <redacted>)"),
        }
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => {
                write!(f, "Credentials(username: {})", username)
            }
            Credentials::AccessToken(_) => write!(f, "Credentials(access token)"),
            Credentials::RefreshToken(_) => write!(f, "Credentials(refresh token)"),
        }
    }
}

/// String that zeros its bytes on drop and never displays its contents.
pub struct SecureString {
    data: Vec<u8>,
}

impl SecureString {
    fn new(s: String) -> Self {
        Self {
            data: s.into_bytes(),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        // Only ever built from a String
        std::str::from_utf8(&self.data).unwrap_or_default()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        for byte in &mut self.data {
            *byte = 0;
        }
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(<redacted>)")
    }
}

/// Options negotiated at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    pub use_compression: bool,
    pub client_name: String,
    pub client_version: String,
    pub autocommit: bool,
    pub schema: Option<String>,
    /// Server-side query timeout in seconds
    pub query_timeout_secs: Option<u64>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            use_compression: false,
            client_name: DRIVER_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            autocommit: true,
            schema: None,
            query_timeout_secs: None,
        }
    }
}

impl LoginOptions {
    fn attributes(&self) -> Attributes {
        Attributes {
            autocommit: Some(self.autocommit),
            current_schema: self.schema.clone(),
            query_timeout: self.query_timeout_secs,
            result_set_max_rows: None,
        }
    }
}

/// Builds the two login messages for a set of credentials.
pub struct AuthenticationHandler<'a> {
    credentials: &'a Credentials,
    options: &'a LoginOptions,
}

impl<'a> AuthenticationHandler<'a> {
    pub fn new(credentials: &'a Credentials, options: &'a LoginOptions) -> Self {
        Self {
            credentials,
            options,
        }
    }

    /// First message: `login` or `loginToken`.
    pub fn login_command(&self) -> LoginCommand {
        if self.credentials.uses_password() {
            LoginCommand::new(PROTOCOL_VERSION)
        } else {
            LoginCommand::token(PROTOCOL_VERSION)
        }
    }

    /// Second message carrying the (encrypted) secret.
    ///
    /// `public_key` is required for password logins.
    pub fn auth_command(
        &self,
        public_key: Option<&PublicKeyResponse>,
    ) -> Result<AuthCommand, TransportError> {
        let mut command = AuthCommand {
            use_compression: self.options.use_compression,
            client_name: self.options.client_name.clone(),
            driver_name: format!("{} {}", DRIVER_NAME, env!("CARGO_PKG_VERSION")),
            client_os: std::env::consts::OS.to_string(),
            client_os_username: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .ok(),
            client_version: self.options.client_version.clone(),
            client_runtime: "Rust".to_string(),
            attributes: self.options.attributes(),
            ..AuthCommand::default()
        };

        match self.credentials {
            Credentials::Password { username, password } => {
                let key = public_key.ok_or_else(|| {
                    TransportError::Authentication("server sent no public key".to_string())
                })?;
                command.username = Some(username.clone());
                command.password = Some(encrypt_password(&key.public_key_pem, password.as_str())?);
            }
            Credentials::AccessToken(token) => {
                command.access_token = Some(token.as_str().to_string());
            }
            Credentials::RefreshToken(token) => {
                command.refresh_token = Some(token.as_str().to_string());
            }
        }

        Ok(command)
    }
}

impl fmt::Debug for AuthenticationHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationHandler")
            .field("credentials", self.credentials)
            .field("options", self.options)
            .finish()
    }
}

/// Encrypt a password with the server's PEM public key.
///
/// Accepts PKCS#1 (`BEGIN RSA PUBLIC KEY`) and SPKI (`BEGIN PUBLIC KEY`) keys.
pub fn encrypt_password(public_key_pem: &str, password: &str) -> Result<String, TransportError> {
    let pem = public_key_pem.trim();
    let key = RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| TransportError::Authentication(format!("invalid public key: {}", e)))?;

    let encrypted = key
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, password.as_bytes())
        .map_err(|e| TransportError::Authentication(format!("password encryption failed: {}", e)))?;

    Ok(BASE64.encode(encrypted))
}
