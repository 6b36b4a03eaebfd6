// src/materialize.rs

//! Copy the merge tool's output tree into the caller's destination.
//!
//! [`materialize`] returns an iterator that copies one file per step, so the
//! caller can report each file as it lands. The walk is depth-first with
//! entries sorted by file name. The first I/O failure ends the iteration;
//! files already copied stay where they are.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::{MergerunError, Result};

/// One file that reached the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    /// Path relative to both the source tree and the destination.
    pub relative: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
}

impl CopiedFile {
    pub fn message(&self) -> String {
        let name = self
            .relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("Copied {} to {}", name, self.destination.display())
    }
}

/// Final line reported once every file has been copied.
pub fn success_message(destination: &Path) -> String {
    format!("Model successfully saved to: {}", destination.display())
}

/// Create `destination` and prepare to copy `source` into it.
pub fn materialize(
    source: impl Into<PathBuf>,
    destination: impl Into<PathBuf>,
) -> Result<Materialization> {
    let source = source.into();
    let destination = destination.into();

    fs::create_dir_all(&destination)
        .map_err(|e| MergerunError::materialize(&destination, e))?;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        "materializing merge output"
    );

    let walker = WalkDir::new(&source)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    Ok(Materialization {
        source,
        destination,
        walker,
        done: false,
    })
}

/// Lazily copies files; see [`materialize`].
pub struct Materialization {
    source: PathBuf,
    destination: PathBuf,
    walker: walkdir::IntoIter,
    done: bool,
}

impl std::fmt::Debug for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materialization")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Materialization {
    fn copy_next(&mut self) -> Option<Result<CopiedFile>> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.source.clone());
                    let io_err = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
                    return Some(Err(MergerunError::materialize(path, io_err)));
                }
            };

            let relative = match entry.path().strip_prefix(&self.source) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            let target = self.destination.join(&relative);

            if entry.file_type().is_dir() {
                if let Err(e) = fs::create_dir_all(&target) {
                    return Some(Err(MergerunError::materialize(target, e)));
                }
                continue;
            }

            if !entry.path().is_file() {
                debug!(path = %entry.path().display(), "skipping non-file entry");
                continue;
            }

            return Some(copy_file(entry.path(), &target).map(|bytes| CopiedFile {
                relative,
                destination: target,
                bytes,
            }));
        }
    }
}

impl Iterator for Materialization {
    type Item = Result<CopiedFile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.copy_next();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Byte-exact copy, replacing any existing file at `to`.
fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| MergerunError::materialize(parent, e))?;
    }

    let mut reader = File::open(from).map_err(|e| MergerunError::materialize(from, e))?;
    let mut writer = File::create(to).map_err(|e| MergerunError::materialize(to, e))?;
    let bytes = io::copy(&mut reader, &mut writer).map_err(|e| MergerunError::materialize(to, e))?;

    debug!(from = %from.display(), to = %to.display(), bytes, "file copied");
    Ok(bytes)
}
