//! Registry client capability used by the transfer pipeline
//!
//! The pipeline never speaks the registry protocol itself. It drives a
//! [`RegistryClient`], normally a [`engine::DockerEngine`] that delegates
//! pull, tag, push and login to a Docker daemon.

pub mod auth;
pub mod engine;

#[cfg(test)]
pub(crate) mod fake;

use crate::image::reference::ImageReference;
use async_trait::async_trait;
use auth::{AuthToken, Credentials};
use futures_util::stream::BoxStream;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Failures reported by a registry client
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("daemon returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("{0}")]
    Daemon(String),

    #[error("progress stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported docker host '{0}': only tcp:// and http:// endpoints are supported")]
    UnsupportedHost(String),
}

/// Outcome of a successful login round-trip
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginStatus {
    #[serde(default)]
    pub status: String,
    /// Token the daemon may hand out in place of the password
    #[serde(default)]
    pub identity_token: Option<String>,
}

/// One line of a pull or push progress stream
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressMessage {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    /// Error text carried in the stream, if this message reports a failure
    pub fn error_message(&self) -> Option<&str> {
        self.error_detail
            .as_ref()
            .and_then(|detail| detail.message.as_deref())
            .or(self.error.as_deref())
    }
}

impl fmt::Display for ProgressMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            write!(f, "{}: ", id)?;
        }
        if let Some(status) = &self.status {
            f.write_str(status)?;
        }
        if let Some(progress) = &self.progress {
            write!(f, " {}", progress)?;
        }
        Ok(())
    }
}

/// Progress of a pull or push, ending when the operation completes
///
/// An `Err` item means the operation failed; consumers stop at the first one.
pub type ProgressStream = BoxStream<'static, Result<ProgressMessage, RegistryError>>;

/// The operations the mirror pipeline needs from a registry client
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Verify credentials against the target registry
    async fn login(&self, credentials: &Credentials) -> Result<LoginStatus, RegistryError>;

    /// Pull an image from its origin registry
    async fn pull(&self, image: &ImageReference) -> Result<ProgressStream, RegistryError>;

    /// Add `target` as another name for the local image `source`
    async fn tag(&self, source: &ImageReference, target: &ImageReference)
        -> Result<(), RegistryError>;

    /// Push a local image, presenting `auth` to the destination registry
    async fn push(
        &self,
        image: &ImageReference,
        auth: &AuthToken,
    ) -> Result<ProgressStream, RegistryError>;
}
