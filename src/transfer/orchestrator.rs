//! Concurrent fan-out of transfers and aggregation of their outcomes

use crate::image::naming::TargetNaming;
use crate::registry::auth::AuthToken;
use crate::registry::RegistryClient;
use crate::request::MirrorRequest;
use crate::transfer::task::TransferTask;
use crate::transfer::{MirroredImage, TransferError, TransferOutcome, TransferStatus};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("no image could be mirrored ({failed} failed)")]
    NoSuccessfulTransfers { failed: usize },
}

/// Every transfer's outcome, in the order they finished
#[derive(Debug, Default)]
pub struct MirrorReport {
    outcomes: Vec<TransferOutcome>,
}

impl MirrorReport {
    pub fn new(outcomes: Vec<TransferOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[TransferOutcome] {
        &self.outcomes
    }

    /// Successful `(source, target)` pairs in arrival order
    pub fn mirrored(&self) -> Vec<MirroredImage> {
        self.outcomes.iter().filter_map(TransferOutcome::mirrored).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs one [`TransferTask`] per requested image
pub struct TransferOrchestrator {
    client: Arc<dyn RegistryClient>,
    naming: TargetNaming,
    max_concurrency: Option<usize>,
    quiet: bool,
}

impl TransferOrchestrator {
    pub fn new(client: Arc<dyn RegistryClient>, naming: TargetNaming) -> Self {
        Self {
            client,
            naming,
            max_concurrency: None,
            quiet: false,
        }
    }

    /// Cap simultaneous transfers; unset means one worker per image
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Number of transfers allowed to run at once for a request of `len` images
    pub fn concurrency_for(&self, len: usize) -> usize {
        self.max_concurrency.map_or(len, |cap| cap.min(len)).max(1)
    }

    /// Mirror every image of `request` and wait for all of them
    ///
    /// Failed transfers are recorded in the report; the run itself fails
    /// only when nothing was mirrored.
    pub async fn run(
        &self,
        request: &MirrorRequest,
        auth: &AuthToken,
    ) -> Result<MirrorReport, OrchestrationError> {
        let images = request.images();
        let permits = Arc::new(Semaphore::new(self.concurrency_for(images.len())));
        info!(
            images = images.len(),
            concurrency = self.concurrency_for(images.len()),
            "Starting transfers"
        );

        // Tasks only send; this function is the single reader of the channel
        let (tx, mut rx) = mpsc::channel::<TransferOutcome>(images.len().max(1));
        let mut tasks = JoinSet::new();

        for (index, source) in images.iter().enumerate() {
            let task = TransferTask::new(index, source.clone(), &self.naming, auth.clone())
                .quiet(self.quiet);
            let client = Arc::clone(&self.client);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let outcome = task.run(client.as_ref()).await;
                // The receiver is drained below until every sender is gone
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(images.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Transfer task terminated abnormally: {}", e);
            }
        }

        // A task that panicked never reported; record it so every image has an outcome
        let reported: HashSet<usize> = outcomes.iter().map(|o| o.index).collect();
        for (index, source) in images.iter().enumerate() {
            if !reported.contains(&index) {
                outcomes.push(TransferOutcome {
                    index,
                    source: source.clone(),
                    target: self.naming.target(source),
                    status: TransferStatus::Failed(TransferError::Aborted {
                        image: source.to_string(),
                        reason: "transfer task terminated abnormally".to_string(),
                    }),
                });
            }
        }

        let report = MirrorReport::new(outcomes);
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Transfers finished"
        );

        if report.succeeded() == 0 {
            return Err(OrchestrationError::NoSuccessfulTransfers {
                failed: report.failed(),
            });
        }
        Ok(report)
    }
}
