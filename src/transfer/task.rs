//! A single pull, retag, push cycle

use crate::image::naming::TargetNaming;
use crate::image::reference::ImageReference;
use crate::registry::auth::AuthToken;
use crate::registry::{ProgressStream, RegistryClient, RegistryError};
use crate::transfer::{TransferError, TransferOutcome, TransferStatus};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

/// Mirrors one source image into the target namespace
///
/// Each step runs once. The first failing step ends the transfer and is
/// reported in the outcome instead of being raised.
#[derive(Debug, Clone)]
pub struct TransferTask {
    index: usize,
    source: ImageReference,
    target: ImageReference,
    auth: AuthToken,
    quiet: bool,
}

impl TransferTask {
    pub fn new(index: usize, source: ImageReference, naming: &TargetNaming, auth: AuthToken) -> Self {
        let target = naming.target(&source);
        Self {
            index,
            source,
            target,
            auth,
            quiet: false,
        }
    }

    /// Suppress progress lines on stderr
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run the transfer to completion against `client`
    pub async fn run(self, client: &dyn RegistryClient) -> TransferOutcome {
        info!(source = %self.source, target = %self.target, "Mirroring image");

        let status = match self.transfer(client).await {
            Ok(()) => {
                info!(source = %self.source, target = %self.target, "Mirrored image");
                TransferStatus::Succeeded
            }
            Err(e) => {
                warn!(source = %self.source, step = e.step(), "{}", e);
                TransferStatus::Failed(e)
            }
        };

        TransferOutcome {
            index: self.index,
            source: self.source,
            target: self.target,
            status,
        }
    }

    async fn transfer(&self, client: &dyn RegistryClient) -> Result<(), TransferError> {
        let pull_failed = |cause| TransferError::PullFailed {
            image: self.source.to_string(),
            cause,
        };
        let pull = client.pull(&self.source).await.map_err(pull_failed)?;
        self.drain(pull, &self.source).await.map_err(pull_failed)?;

        client
            .tag(&self.source, &self.target)
            .await
            .map_err(|cause| TransferError::TagFailed {
                image: self.target.to_string(),
                cause,
            })?;

        let push_failed = |cause| TransferError::PushFailed {
            image: self.target.to_string(),
            cause,
        };
        let push = client
            .push(&self.target, &self.auth)
            .await
            .map_err(push_failed)?;
        self.drain(push, &self.target).await.map_err(push_failed)?;

        Ok(())
    }

    /// Forward progress until the stream ends or reports an error
    async fn drain(
        &self,
        mut progress: ProgressStream,
        image: &ImageReference,
    ) -> Result<(), RegistryError> {
        while let Some(message) = progress.next().await {
            let message = message?;
            debug!(image = %image, "{}", message);
            if !self.quiet {
                eprintln!("{}: {}", image, message);
            }
        }
        Ok(())
    }
}
