//! Command line interface

pub mod mirror;

use crate::config::MirrorConfig;
use crate::registry::engine::{DockerEngine, DEFAULT_DOCKER_HOST};
use crate::request::DEFAULT_MAX_CONTENT;
use crate::script::DEFAULT_OUTPUT_PATH;
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

/// Hubmirror - mirror container images into your own registry namespace
#[derive(Parser)]
#[command(name = "hubmirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Images to mirror, as JSON: {"hub-mirror":["nginx:latest","redis:6"]}
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the JSON request from a file instead of --content
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    /// Maximum number of images per request
    #[arg(long = "maxContent", visible_alias = "max-content", default_value_t = DEFAULT_MAX_CONTENT)]
    pub max_content: usize,

    /// Account on the target registry
    #[arg(long, env = "HUBMIRROR_USERNAME", default_value = "")]
    pub username: String,

    /// Password for the target registry account
    #[arg(long, env = "HUBMIRROR_PASSWORD", default_value = "", hide_env_values = true, hide_default_value = true)]
    pub password: String,

    /// Where to write the pull-and-retag script
    #[arg(long = "outputPath", visible_alias = "output-path", default_value = DEFAULT_OUTPUT_PATH)]
    pub output_path: PathBuf,

    /// Target registry host (defaults to the daemon's default registry)
    #[arg(long)]
    pub registry: Option<String>,

    /// Docker daemon endpoint
    #[arg(long, env = "DOCKER_HOST", default_value = DEFAULT_DOCKER_HOST)]
    pub docker_host: String,

    /// Maximum number of images transferred at once (default: all)
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,

    /// Suppress pull and push progress
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run a complete mirroring job against the configured Docker daemon
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = MirrorConfig::from_cli(cli)?;

    tracing::info!(docker_host = %config.docker_host, "Connecting to Docker daemon");
    let engine = Arc::new(DockerEngine::new(&config.docker_host)?);

    let report = mirror::run(&config, engine).await?;

    for outcome in report.failures() {
        if let Some(e) = outcome.error() {
            println!("FAILED  {}: {}", outcome.source, e);
        }
    }
    for image in report.mirrored() {
        println!("MIRRORED {} -> {}", image.source, image.target);
    }
    println!(
        "{} of {} images mirrored; script written to {}",
        report.succeeded(),
        report.outcomes().len(),
        config.output_path.display()
    );

    Ok(())
}
