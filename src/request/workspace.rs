// src/request/workspace.rs

//! Per-invocation scratch directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use super::command::CONFIG_FILE_NAME;

/// Ephemeral directory tree owned by exactly one invocation.
///
/// Layout:
///
/// ```text
/// <tmp>/mergerun-XXXX/
///   .cache/          cache home for the child process
///   merged/          working directory of the merge tool
///     config.yaml    the caller's configuration, verbatim
///     merge/         written by the merge tool
/// ```
///
/// The directory is removed when the value is dropped; removal errors are
/// ignored. [`Workspace::close`] does the same but logs failures.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    merged: PathBuf,
}

impl Workspace {
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("mergerun-").tempdir()?;
        let merged = dir.path().join("merged");
        fs::create_dir_all(&merged)?;
        debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir, merged })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Working directory of the merge tool and source tree for
    /// materialization.
    pub fn merged_dir(&self) -> &Path {
        &self.merged
    }

    pub fn config_path(&self) -> PathBuf {
        self.merged.join(CONFIG_FILE_NAME)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join(".cache")
    }

    /// Write the configuration text where the merge tool expects it.
    pub fn write_config(&self, text: &str) -> io::Result<PathBuf> {
        let path = self.config_path();
        fs::write(&path, text)?;
        Ok(path)
    }

    /// Remove the workspace, logging (but otherwise ignoring) failures.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "workspace removed"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove workspace"),
        }
    }
}
