// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

/// Why a merge configuration was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty text, or text that is not well-formed YAML.
    #[error("{0}")]
    Parse(String),

    /// Well-formed YAML that does not describe a valid merge configuration.
    #[error("{0}")]
    Schema(String),
}

#[derive(Error, Debug)]
pub enum MergerunError {
    #[error("Invalid merge configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Merge failed (exit code {0}).")]
    NonZeroExit(i32),

    #[error("copying {path:?}: {source}")]
    MaterializeIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MergerunError {
    pub(crate) fn materialize(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MergerunError::MaterializeIo {
            path: path.into(),
            source,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MergerunError>;
