//! Image transfers: one pull, retag and push per source image

pub mod orchestrator;
pub mod task;

use crate::image::reference::ImageReference;
use crate::registry::RegistryError;
use thiserror::Error;

/// Failure of a single transfer; never fatal to other transfers
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("pull of {image} failed: {cause}")]
    PullFailed {
        image: String,
        #[source]
        cause: RegistryError,
    },

    #[error("tagging {image} failed: {cause}")]
    TagFailed {
        image: String,
        #[source]
        cause: RegistryError,
    },

    #[error("push of {image} failed: {cause}")]
    PushFailed {
        image: String,
        #[source]
        cause: RegistryError,
    },

    #[error("transfer of {image} did not report: {reason}")]
    Aborted { image: String, reason: String },
}

impl TransferError {
    /// Short name of the step that failed
    pub fn step(&self) -> &'static str {
        match self {
            TransferError::PullFailed { .. } => "pull",
            TransferError::TagFailed { .. } => "tag",
            TransferError::PushFailed { .. } => "push",
            TransferError::Aborted { .. } => "aborted",
        }
    }
}

#[derive(Debug)]
pub enum TransferStatus {
    Succeeded,
    Failed(TransferError),
}

/// Result of one transfer, as handed to the aggregator
#[derive(Debug)]
pub struct TransferOutcome {
    /// Position of the source in the request
    pub index: usize,
    pub source: ImageReference,
    pub target: ImageReference,
    pub status: TransferStatus,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Succeeded)
    }

    pub fn error(&self) -> Option<&TransferError> {
        match &self.status {
            TransferStatus::Failed(e) => Some(e),
            TransferStatus::Succeeded => None,
        }
    }

    /// The `(source, target)` pair, if the transfer succeeded
    pub fn mirrored(&self) -> Option<MirroredImage> {
        self.is_success().then(|| MirroredImage {
            source: self.source.clone(),
            target: self.target.clone(),
        })
    }
}

/// A source image and where its mirror now lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredImage {
    pub source: ImageReference,
    pub target: ImageReference,
}

impl MirroredImage {
    pub fn new(source: ImageReference, target: ImageReference) -> Self {
        Self { source, target }
    }
}
