//! Where a mirrored image lands in the target namespace

use crate::image::reference::{is_path_byte, ImageReference};
use thiserror::Error;

/// Account or registry values that cannot form an image reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("invalid username '{0}': expected a single path component of [A-Za-z0-9._-]")]
    InvalidUsername(String),

    #[error("invalid registry '{0}': expected host[:port] without a scheme or path")]
    InvalidRegistry(String),
}

/// Maps source images into a single account's namespace
///
/// `nginx:latest` becomes `<username>/nginx:latest`, and nested paths are
/// flattened with `.` so `lib/app:1` becomes `<username>/lib.app:1`.
/// The flattening is not collision free: `a/b` and `a.b` both map to
/// `<username>/a.b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNaming {
    registry: Option<String>,
    username: String,
}

impl TargetNaming {
    /// Naming rooted at the daemon's default registry
    pub fn new(username: impl Into<String>) -> Result<Self, NamingError> {
        Self::with_registry(None, username)
    }

    /// Naming rooted at an explicit registry host, e.g. `registry.example.com:5000`
    ///
    /// Both parts end up verbatim in every target reference, so they are held
    /// to the same alphabet as validated sources.
    pub fn with_registry(
        registry: Option<String>,
        username: impl Into<String>,
    ) -> Result<Self, NamingError> {
        let username = username.into();
        if !is_valid_component(&username) {
            return Err(NamingError::InvalidUsername(username));
        }

        let registry = registry.filter(|r| !r.is_empty());
        if let Some(registry) = &registry {
            if !is_valid_host(registry) {
                return Err(NamingError::InvalidRegistry(registry.clone()));
            }
        }

        Ok(Self { registry, username })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Target reference for a source image
    pub fn target(&self, source: &ImageReference) -> ImageReference {
        let flattened = source.repository().replace('/', ".");
        let repository = match &self.registry {
            Some(registry) => format!("{}/{}/{}", registry, self.username, flattened),
            None => format!("{}/{}", self.username, flattened),
        };
        ImageReference::from_parts(repository, source.tag().map(str::to_string))
    }
}

fn is_valid_component(component: &str) -> bool {
    !component.is_empty() && component.bytes().all(is_path_byte)
}

/// `host[:port]` where host is dot-separated labels of `[A-Za-z0-9-]`
fn is_valid_host(registry: &str) -> bool {
    let (host, port) = match registry.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };
    let host_ok = !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty() && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    let port_ok = port.map_or(true, |p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    host_ok && port_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_of(naming: &TargetNaming, source: &str) -> String {
        naming
            .target(&ImageReference::parse(source).unwrap())
            .to_string()
    }

    #[test]
    fn test_target_flattens_paths() {
        let naming = TargetNaming::new("alice").unwrap();
        assert_eq!(target_of(&naming, "lib/app:1"), "alice/lib.app:1");
        assert_eq!(target_of(&naming, "nginx:latest"), "alice/nginx:latest");
        assert_eq!(target_of(&naming, "redis"), "alice/redis");
        assert_eq!(
            target_of(&naming, "gcr.io/google/pause:3.9"),
            "alice/gcr.io.google.pause:3.9"
        );
        assert_eq!(target_of(&naming, "lib/app:1"), target_of(&naming, "lib/app:1"));
    }

    #[test]
    fn test_target_with_registry() {
        let naming =
            TargetNaming::with_registry(Some("registry.example.com".into()), "alice").unwrap();
        assert_eq!(
            target_of(&naming, "lib/app:1"),
            "registry.example.com/alice/lib.app:1"
        );

        let naming = TargetNaming::with_registry(Some("localhost:5000".into()), "alice").unwrap();
        assert_eq!(target_of(&naming, "redis:6"), "localhost:5000/alice/redis:6");

        let naming = TargetNaming::with_registry(Some(String::new()), "alice").unwrap();
        assert_eq!(naming.registry(), None);
    }

    #[test]
    fn test_rejects_unsafe_username() {
        for username in ["", "alice;touch /tmp/x;y", "al ice", "alice/bob", "alice:1", "$(id)"] {
            assert_eq!(
                TargetNaming::new(username),
                Err(NamingError::InvalidUsername(username.to_string())),
                "{username:?}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_registry() {
        for registry in [
            "https://registry.example.com",
            "registry.example.com/path",
            "registry.example.com:",
            "registry.example.com:abc",
            "reg istry",
            "registry..example.com",
            ":5000",
        ] {
            assert_eq!(
                TargetNaming::with_registry(Some(registry.to_string()), "alice"),
                Err(NamingError::InvalidRegistry(registry.to_string())),
                "{registry:?}"
            );
        }
    }

    #[test]
    fn test_flattening_can_collide() {
        let naming = TargetNaming::new("alice").unwrap();
        assert_eq!(target_of(&naming, "a/b"), target_of(&naming, "a.b"));
    }

    #[test]
    fn test_untagged_source_keeps_no_tag() {
        let naming = TargetNaming::new("alice").unwrap();
        let target = naming.target(&ImageReference::parse("redis").unwrap());
        assert_eq!(target.tag(), None);
        assert_eq!(target.tag_or_default(), "latest");
    }
}
