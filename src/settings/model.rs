// src/settings/model.rs

use serde::Deserialize;

use crate::types::AcceleratorMode;

/// Tool settings as read from `Mergerun.toml`.
///
/// ```toml
/// [runner]
/// command = "mergekit-yaml"
/// accelerator = "auto"
/// cache_env = "HF_HOME"
///
/// [output]
/// prefix = "Aculi-mergekit"
///
/// [hooks]
/// on_start = "xdg-open http://127.0.0.1:7860"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub hooks: HookSection,
}

/// `[runner]` section: how the merge tool is launched.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Executable name (looked up on `PATH`) or path.
    #[serde(default = "default_command")]
    pub command: String,

    /// `"auto"`, `"cuda"` or `"cpu"`. Resolved once at startup.
    #[serde(default)]
    pub accelerator: AcceleratorMode,

    /// Variable pointed at the workspace cache so downloads stay private to
    /// one invocation.
    #[serde(default = "default_cache_env")]
    pub cache_env: String,
}

fn default_command() -> String {
    "mergekit-yaml".to_string()
}

fn default_cache_env() -> String {
    "HF_HOME".to_string()
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            accelerator: AcceleratorMode::default(),
            cache_env: default_cache_env(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// Leading component of synthesized destination folder names.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "Aculi-mergekit".to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

/// `[hooks]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HookSection {
    /// Shell command started once when the CLI comes up (e.g. open a
    /// dashboard). Its outcome is ignored.
    #[serde(default)]
    pub on_start: Option<String>,
}
