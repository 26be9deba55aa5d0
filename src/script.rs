//! Rendering of the pull-and-retag script

use crate::transfer::MirroredImage;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the generated script
pub const DEFAULT_OUTPUT_PATH: &str = "output.sh";

#[derive(Error, Debug)]
#[error("failed to write script to {}: {source}", path.display())]
pub struct ScriptWriteError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Turns mirrored images into `docker pull` / `docker tag` statements
///
/// Image references are restricted to `[A-Za-z0-9._:/-]`, so they are
/// emitted without shell quoting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptEmitter;

impl ScriptEmitter {
    /// Two lines per image, in the order given
    pub fn render(&self, mirrored: &[MirroredImage]) -> String {
        let mut script = String::new();
        for image in mirrored {
            // Writing into a String cannot fail
            let _ = writeln!(script, "docker pull {}", image.target);
            let _ = writeln!(script, "docker tag {} {}", image.target, image.source);
        }
        script
    }

    /// Render and write the script to `path`, replacing any existing file
    pub fn write(&self, path: &Path, mirrored: &[MirroredImage]) -> Result<(), ScriptWriteError> {
        let wrap = |source| ScriptWriteError {
            path: path.to_path_buf(),
            source,
        };

        fs::write(path, self.render(mirrored)).map_err(wrap)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(wrap)?;
        }

        Ok(())
    }
}
