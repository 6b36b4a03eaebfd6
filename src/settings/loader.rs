// src/settings/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{MergerunError, Result};
use crate::settings::model::Settings;

/// Load a settings file from a given path.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for the
/// semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let settings: Settings = toml::from_str(&contents)?;

    Ok(settings)
}

/// Load settings from path and run basic validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let settings = load_from_path(&path)?;
    validate(&settings)?;
    Ok(settings)
}

/// Resolve the settings the CLI should use.
///
/// - An explicit path must exist.
/// - Without one, [`default_settings_path`] is used if present, otherwise
///   built-in defaults apply.
pub fn resolve(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => load_and_validate(path),
        None => {
            let path = default_settings_path();
            if path.is_file() {
                load_and_validate(&path)
            } else {
                debug!(path = %path.display(), "no settings file; using defaults");
                Ok(Settings::default())
            }
        }
    }
}

/// Basic sanity checks that serde cannot express.
pub fn validate(settings: &Settings) -> Result<()> {
    if settings.runner.command.trim().is_empty() {
        return Err(MergerunError::Settings(
            "[runner].command must not be empty".to_string(),
        ));
    }

    let cache_env = settings.runner.cache_env.trim();
    if cache_env.is_empty() || cache_env.contains('=') || cache_env.contains('\0') {
        return Err(MergerunError::Settings(format!(
            "[runner].cache_env is not a valid variable name: {:?}",
            settings.runner.cache_env
        )));
    }

    if settings.output.prefix.trim().is_empty() {
        return Err(MergerunError::Settings(
            "[output].prefix must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// `Mergerun.toml` in the current working directory.
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("Mergerun.toml")
}
