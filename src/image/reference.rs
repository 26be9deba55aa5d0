//! Container image reference syntax

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tag used when a reference does not name one
pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// A reference that is not of the form `[registry[:port]/]repo[/...][:tag]`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid image reference '{reference}': {reason}")]
pub struct InvalidReference {
    pub reference: String,
    pub reason: &'static str,
}

/// Tag-addressed image reference, e.g. `nginx:latest` or `ghcr.io/owner/repo:tag`
///
/// Unlike a pull-only reference this never carries a digest: every mirrored
/// image has to be retagged, and a digest cannot be the target of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Everything before the tag, registry host included when present
    repository: String,
    /// Tag as written, if any
    tag: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string
    pub fn parse(reference: &str) -> Result<Self, InvalidReference> {
        let reference = reference.trim();
        let invalid = |reason| InvalidReference {
            reference: reference.to_string(),
            reason,
        };

        if reference.is_empty() {
            return Err(invalid("empty reference"));
        }
        if reference.contains('@') {
            return Err(invalid("digest references cannot be retagged"));
        }

        // A colon followed by a '/' belongs to a registry port, not a tag
        let (repository, tag) = match reference.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
            _ => (reference, None),
        };

        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return Err(invalid("tag must be 1-128 characters of [A-Za-z0-9_.-]"));
            }
        }

        let components: Vec<&str> = repository.split('/').collect();
        for (idx, component) in components.iter().enumerate() {
            let component = match component.split_once(':') {
                // Only a registry host (first of several components) may carry a port
                Some((host, port)) if idx == 0 && components.len() > 1 => {
                    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(invalid("registry port must be numeric"));
                    }
                    host
                }
                Some(_) => return Err(invalid("unexpected ':' in repository path")),
                None => component,
            };
            if component.is_empty() {
                return Err(invalid("empty path component"));
            }
            if !component.bytes().all(is_path_byte) {
                return Err(invalid("path components may only contain [A-Za-z0-9._-]"));
            }
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.map(str::to_string),
        })
    }

    /// Build a reference from parts that are already known to be valid
    pub(crate) fn from_parts(repository: String, tag: Option<String>) -> Self {
        Self { repository, tag }
    }

    /// Repository path, including the registry host when one was given
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Tag exactly as written
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Tag, falling back to `latest` like the docker CLI does
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.repository, tag),
            None => f.write_str(&self.repository),
        }
    }
}

impl FromStr for ImageReference {
    type Err = InvalidReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub(crate) fn is_path_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && !tag.starts_with(['.', '-'])
        && tag.bytes().all(is_path_byte)
}
