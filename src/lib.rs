//! Hubmirror - re-publish container images into your own registry namespace
//!
//! This crate pulls a bounded list of source images through a Docker daemon,
//! retags each one under a target account, pushes it, and renders a shell
//! script that lets anyone pull the mirrored images back under their
//! original names.

pub mod cli;
pub mod config;
pub mod image;
pub mod registry;
pub mod request;
pub mod script;
pub mod transfer;

use thiserror::Error;

pub use config::MirrorConfig;
pub use image::naming::{NamingError, TargetNaming};
pub use image::reference::ImageReference;
pub use registry::auth::{AuthError, AuthToken, Credentials, RegistryAuthenticator};
pub use registry::engine::DockerEngine;
pub use registry::{RegistryClient, RegistryError};
pub use request::{MirrorRequest, RequestValidator, ValidationError};
pub use script::{ScriptEmitter, ScriptWriteError};
pub use transfer::orchestrator::{MirrorReport, OrchestrationError, TransferOrchestrator};
pub use transfer::task::TransferTask;
pub use transfer::{MirroredImage, TransferError, TransferOutcome, TransferStatus};

/// Main error type for a mirroring run
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid target namespace: {0}")]
    Naming(#[from] NamingError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Script(#[from] ScriptWriteError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "hubmirror";
