// src/request/mod.rs

//! Everything needed to launch one merge: the workspace, the destination, the
//! child environment and the argv.
//!
//! - [`workspace`] owns the temporary directory tree.
//! - [`naming`] synthesizes a destination when the caller gave none.
//! - [`command`] holds the two argv variants.

pub mod command;
pub mod naming;
pub mod workspace;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::MergeConfiguration;
use crate::errors::Result;
use crate::settings::Settings;
use crate::types::Accelerator;

pub use command::{CONFIG_FILE_NAME, OUTPUT_DIR_NAME, command_args};
pub use workspace::Workspace;

/// A fully resolved process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Complete child environment; nothing else is inherited.
    pub env: BTreeMap<OsString, OsString>,
}

impl RunRequest {
    /// Human-readable command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of [`RunRequestBuilder::build`].
#[derive(Debug)]
pub struct PreparedRun {
    pub workspace: Workspace,
    pub request: RunRequest,
    pub config_path: PathBuf,
    pub destination: PathBuf,
    /// True when `destination` was synthesized.
    pub destination_generated: bool,
}

/// Derives the workspace, destination, environment and argv for a single
/// invocation.
#[derive(Debug, Clone)]
pub struct RunRequestBuilder {
    command: String,
    cache_env: String,
    prefix: String,
    accelerator: Accelerator,
    cwd: Option<PathBuf>,
}

impl RunRequestBuilder {
    pub fn new(settings: &Settings, accelerator: Accelerator) -> Self {
        Self {
            command: settings.runner.command.clone(),
            cache_env: settings.runner.cache_env.clone(),
            prefix: settings.output.prefix.clone(),
            accelerator,
            cwd: None,
        }
    }

    /// Root for synthesized destinations. Defaults to the process working
    /// directory at build time.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Resolve where the merged model should end up, without touching disk.
    ///
    /// A blank destination counts as absent. Any other value is used exactly
    /// as given.
    pub fn resolve_destination(
        &self,
        config: &MergeConfiguration,
        destination: Option<&str>,
    ) -> Result<(PathBuf, bool)> {
        match destination.filter(|d| !d.trim().is_empty()) {
            Some(dest) => Ok((PathBuf::from(dest), false)),
            None => {
                let cwd = match &self.cwd {
                    Some(cwd) => cwd.clone(),
                    None => std::env::current_dir()?,
                };
                let dest = naming::synthesize_destination(
                    &self.prefix,
                    config.merge_method(),
                    &cwd,
                    &mut rand::thread_rng(),
                );
                Ok((dest, true))
            }
        }
    }

    /// Create the workspace, persist the configuration, and assemble the
    /// [`RunRequest`].
    pub fn build(
        &self,
        config: &MergeConfiguration,
        destination: Option<&str>,
    ) -> Result<PreparedRun> {
        let (destination, destination_generated) =
            self.resolve_destination(config, destination)?;

        let workspace = Workspace::create()?;
        let config_path = workspace.write_config(config.source_text())?;

        let request = RunRequest {
            program: self.command.clone(),
            args: command_args(self.accelerator),
            cwd: workspace.merged_dir().to_path_buf(),
            env: child_environment(std::env::vars_os(), &self.cache_env, &workspace.cache_dir()),
        };

        info!(
            workspace = %workspace.root().display(),
            destination = %destination.display(),
            generated = destination_generated,
            "run request prepared"
        );
        debug!(command = %request.command_line(), "merge command line");

        Ok(PreparedRun {
            workspace,
            request,
            config_path,
            destination,
            destination_generated,
        })
    }
}

/// Copy of `inherited` with `cache_env` pointed at `cache_dir`.
pub fn child_environment(
    inherited: impl IntoIterator<Item = (OsString, OsString)>,
    cache_env: &str,
    cache_dir: &Path,
) -> BTreeMap<OsString, OsString> {
    let mut env: BTreeMap<OsString, OsString> = inherited.into_iter().collect();
    env.insert(OsString::from(cache_env), cache_dir.as_os_str().to_os_string());
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;

    fn linear() -> MergeConfiguration {
        validate("merge_method: linear\nmodels:\n  - model: a\n  - model: b\n").unwrap()
    }

    #[test]
    fn environment_overrides_only_cache_home() {
        let inherited = vec![
            (OsString::from("PATH"), OsString::from("/usr/bin")),
            (OsString::from("HF_HOME"), OsString::from("/home/me/.cache/hf")),
        ];
        let env = child_environment(inherited, "HF_HOME", Path::new("/tmp/ws/.cache"));

        assert_eq!(env.len(), 2);
        assert_eq!(env[&OsString::from("PATH")], OsString::from("/usr/bin"));
        assert_eq!(env[&OsString::from("HF_HOME")], OsString::from("/tmp/ws/.cache"));
    }

    #[test]
    fn build_prepares_workspace_and_request() {
        let cwd = tempfile::tempdir().unwrap();
        let builder = RunRequestBuilder::new(&Settings::default(), Accelerator::Cuda)
            .with_cwd(cwd.path());
        let cfg = linear();

        let prepared = builder.build(&cfg, None).unwrap();

        assert!(prepared.destination_generated);
        assert_eq!(prepared.destination.parent(), Some(cwd.path()));
        assert!(!prepared.destination.exists());

        assert_eq!(prepared.config_path, prepared.workspace.merged_dir().join("config.yaml"));
        assert_eq!(
            std::fs::read_to_string(&prepared.config_path).unwrap(),
            cfg.source_text()
        );

        let req = &prepared.request;
        assert_eq!(req.program, "mergekit-yaml");
        assert_eq!(req.cwd, prepared.workspace.merged_dir());
        assert_eq!(
            req.env[&OsString::from("HF_HOME")],
            prepared.workspace.cache_dir().into_os_string()
        );
        assert_eq!(
            req.command_line(),
            "mergekit-yaml config.yaml merge --copy-tokenizer --cuda --low-cpu-memory"
        );
    }

    #[test]
    fn explicit_destination_is_kept() {
        let builder = RunRequestBuilder::new(&Settings::default(), Accelerator::Cpu);
        let (dest, generated) = builder
            .resolve_destination(&linear(), Some("/srv/models/out"))
            .unwrap();

        assert_eq!(dest, PathBuf::from("/srv/models/out"));
        assert!(!generated);
    }

    #[test]
    fn explicit_destination_keeps_surrounding_spaces() {
        let builder = RunRequestBuilder::new(&Settings::default(), Accelerator::Cpu)
            .with_cwd("/work");
        let (dest, generated) = builder.resolve_destination(&linear(), Some(" out ")).unwrap();

        assert_eq!(dest, PathBuf::from(" out "));
        assert!(!generated);
    }

    #[test]
    fn blank_destination_is_synthesized() {
        let builder = RunRequestBuilder::new(&Settings::default(), Accelerator::Cpu)
            .with_cwd("/work");
        let (dest, generated) = builder.resolve_destination(&linear(), Some("   ")).unwrap();

        assert!(generated);
        let name = dest.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("Aculi-mergekit-linear-"));
        assert_eq!(dest.parent(), Some(Path::new("/work")));
    }
}
