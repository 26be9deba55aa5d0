//! The mirroring pipeline: validate, authenticate, transfer, write script

use crate::config::MirrorConfig;
use crate::registry::auth::{AuthError, RegistryAuthenticator};
use crate::registry::RegistryClient;
use crate::request::RequestValidator;
use crate::script::ScriptEmitter;
use crate::transfer::orchestrator::{MirrorReport, TransferOrchestrator};
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Mirror the configured images through `client` and write the script
///
/// Validation, naming and login failures abort before any transfer starts.
/// The script is written only if at least one image was mirrored.
pub async fn run(config: &MirrorConfig, client: Arc<dyn RegistryClient>) -> Result<MirrorReport> {
    info!("Validating source images");
    let request = RequestValidator::new(config.max_content).validate_content(&config.content)?;
    info!(images = request.len(), max = request.max_content(), "Request accepted");

    if !config.credentials.is_complete() {
        return Err(AuthError::MissingCredentials.into());
    }
    let naming = config.naming()?;

    let auth = RegistryAuthenticator::new(Arc::clone(&client))
        .authenticate(&config.credentials)
        .await?;

    let report = TransferOrchestrator::new(client, naming)
        .with_max_concurrency(config.max_concurrency)
        .quiet(config.quiet)
        .run(&request, &auth)
        .await?;

    ScriptEmitter.write(&config.output_path, &report.mirrored())?;
    info!(path = %config.output_path.display(), "Wrote pull script");

    Ok(report)
}
