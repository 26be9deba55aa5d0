//! Run configuration
//!
//! Built once from the command line and passed by reference to every stage.

use crate::cli::Cli;
use crate::image::naming::{NamingError, TargetNaming};
use crate::registry::auth::Credentials;
use crate::{MirrorError, Result};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// JSON request document, `{"hub-mirror": [...]}`
    pub content: String,
    pub max_content: usize,
    pub credentials: Credentials,
    /// Target registry host; the daemon's default registry when unset
    pub registry: Option<String>,
    pub output_path: PathBuf,
    pub docker_host: String,
    pub max_concurrency: Option<usize>,
    pub quiet: bool,
}

impl MirrorConfig {
    /// Resolve command line flags, reading `--content-file` if given
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let content = match (cli.content, cli.content_file) {
            (Some(content), None) => content,
            (None, Some(path)) => fs::read_to_string(&path).map_err(|e| {
                MirrorError::Config(format!("cannot read {}: {}", path.display(), e))
            })?,
            (None, None) => {
                return Err(MirrorError::Config(
                    "one of --content or --content-file is required".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(MirrorError::Config(
                    "--content and --content-file are mutually exclusive".to_string(),
                ))
            }
        };
        let registry = cli.registry.filter(|r| !r.is_empty());

        let config = Self {
            content,
            max_content: cli.max_content,
            credentials: Credentials::new(cli.username, cli.password)
                .with_server_address(registry.clone()),
            registry,
            output_path: cli.output_path,
            docker_host: cli.docker_host,
            max_concurrency: cli.concurrency.map(|n| n.get()),
            quiet: cli.quiet,
        };

        // An empty username is reported as missing credentials later on
        if !config.credentials.username().is_empty() {
            config.naming()?;
        }
        Ok(config)
    }

    /// Naming scheme for the configured account
    pub fn naming(&self) -> std::result::Result<TargetNaming, NamingError> {
        TargetNaming::with_registry(self.registry.clone(), self.credentials.username())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hubmirror").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_from_inline_content() {
        let config = MirrorConfig::from_cli(parse(&[
            "--content",
            r#"{"hub-mirror":["nginx"]}"#,
            "--username",
            "alice",
            "--password",
            "pw",
        ]))
        .unwrap();
        assert_eq!(config.content, r#"{"hub-mirror":["nginx"]}"#);
        assert_eq!(config.max_content, 10);
        assert_eq!(config.output_path, PathBuf::from("output.sh"));
        assert_eq!(config.max_concurrency, None);
        assert_eq!(
            config.naming().unwrap().target(&"nginx".parse().unwrap()).to_string(),
            "alice/nginx"
        );
    }

    #[test]
    fn test_from_content_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("request.json");
        fs::write(&path, r#"{"hub-mirror":["redis:6"]}"#).unwrap();

        let config = MirrorConfig::from_cli(parse(&[
            "--content-file",
            path.to_str().unwrap(),
            "--registry",
            "registry.example.com",
            "--username",
            "alice",
        ]))
        .unwrap();
        assert_eq!(config.content, r#"{"hub-mirror":["redis:6"]}"#);
        assert_eq!(config.credentials.server_address(), Some("registry.example.com"));
        assert_eq!(
            config.naming().unwrap().target(&"redis:6".parse().unwrap()).to_string(),
            "registry.example.com/alice/redis:6"
        );
    }

    #[test]
    fn test_rejects_unsafe_namespace() {
        let content = r#"{"hub-mirror":["nginx"]}"#;

        let err = MirrorConfig::from_cli(parse(&[
            "--content",
            content,
            "--username",
            "alice;touch /tmp/x;y",
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            MirrorError::Naming(NamingError::InvalidUsername(_))
        ));

        let err = MirrorConfig::from_cli(parse(&[
            "--content",
            content,
            "--username",
            "alice",
            "--registry",
            "https://registry.example.com",
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            MirrorError::Naming(NamingError::InvalidRegistry(_))
        ));
    }

    #[test]
    fn test_missing_content() {
        let err = MirrorConfig::from_cli(parse(&["--username", "alice"])).unwrap_err();
        assert!(matches!(err, MirrorError::Config(_)));
    }

    #[test]
    fn test_unreadable_content_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.json");
        let err = MirrorConfig::from_cli(parse(&["--content-file", path.to_str().unwrap()]))
            .unwrap_err();
        assert!(matches!(err, MirrorError::Config(_)));
    }
}
