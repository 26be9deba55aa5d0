//! Credentials and the shared push token

use crate::registry::{RegistryClient, RegistryError};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("username and password must not be empty")]
    MissingCredentials,

    #[error("registry rejected login for '{username}': {reason}")]
    LoginRejected { username: String, reason: String },

    #[error("login failed: {0}")]
    Transport(#[source] RegistryError),

    #[error("failed to encode auth payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Account on the target registry
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
    server_address: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server_address: None,
        }
    }

    /// Registry to log in to; the daemon's default registry when unset
    pub fn with_server_address(mut self, server_address: Option<String>) -> Self {
        self.server_address = server_address.filter(|s| !s.is_empty());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn server_address(&self) -> Option<&str> {
        self.server_address.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_address", &self.server_address)
            .finish()
    }
}

/// Auth config as the daemon expects it in `X-Registry-Auth`
#[derive(Serialize)]
struct AuthPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identitytoken: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serveraddress: Option<&'a str>,
}

/// Encoded credentials presented on every push
///
/// Created once per run and shared read-only by all transfers; clones share
/// the same buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(Arc<str>);

impl AuthToken {
    /// URL-safe base64 of the JSON auth config
    ///
    /// An identity token handed out by the daemon replaces the password.
    pub fn encode(
        credentials: &Credentials,
        identity_token: Option<&str>,
    ) -> Result<Self, serde_json::Error> {
        let payload = match identity_token {
            Some(token) => AuthPayload {
                username: None,
                password: None,
                identitytoken: Some(token),
                serveraddress: credentials.server_address(),
            },
            None => AuthPayload {
                username: Some(credentials.username()),
                password: Some(credentials.password()),
                identitytoken: None,
                serveraddress: credentials.server_address(),
            },
        };
        let json = serde_json::to_vec(&payload)?;
        Ok(Self(URL_SAFE.encode(json).into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Logs in once and derives the token every push will use
pub struct RegistryAuthenticator {
    client: Arc<dyn RegistryClient>,
}

impl RegistryAuthenticator {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    /// Verify `credentials` with a single login round-trip
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, AuthError> {
        if !credentials.is_complete() {
            return Err(AuthError::MissingCredentials);
        }

        info!(
            username = credentials.username(),
            registry = credentials.server_address().unwrap_or("default"),
            "Logging in to target registry"
        );
        let status = self
            .client
            .login(credentials)
            .await
            .map_err(|e| match e {
                RegistryError::Status { code, message } if is_rejection(code, &message) => {
                    AuthError::LoginRejected {
                        username: credentials.username().to_string(),
                        reason: message,
                    }
                }
                other => AuthError::Transport(other),
            })?;
        debug!(status = %status.status, "Login accepted");

        let identity_token = status.identity_token.as_deref().filter(|t| !t.is_empty());
        Ok(AuthToken::encode(credentials, identity_token)?)
    }
}

/// Older daemons answer a bad password with a 500 and only the message tells
fn is_rejection(code: u16, message: &str) -> bool {
    if code == 401 || code == 403 {
        return true;
    }
    let message = message.to_ascii_lowercase();
    message.contains("unauthorized") || message.contains("incorrect username or password")
}
