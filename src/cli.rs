// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::AcceleratorMode;

/// Command-line arguments for `mergerun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mergerun",
    version,
    about = "Run a model merge from a YAML configuration and collect the result.",
    long_about = None
)]
pub struct CliArgs {
    /// Merge configuration (YAML). Use `-` to read standard input.
    #[arg(long, short = 'c', value_name = "PATH", default_value = "config.yaml")]
    pub config: String,

    /// Directory the merged model is copied to.
    ///
    /// If omitted, a new folder named `<prefix>-<merge_method>-<random>` is
    /// created in the current working directory.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub out: Option<String>,

    /// Settings file (TOML).
    ///
    /// Default: `Mergerun.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Override the accelerator detection from settings.
    #[arg(long, value_enum, value_name = "MODE")]
    pub accelerator: Option<AcceleratorArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MERGERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the configuration and print the command that would run.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the supported merge methods and exit.
    #[arg(long)]
    pub list_methods: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Accelerator choice as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum AcceleratorArg {
    Auto,
    Cuda,
    Cpu,
}

impl From<AcceleratorArg> for AcceleratorMode {
    fn from(arg: AcceleratorArg) -> Self {
        match arg {
            AcceleratorArg::Auto => AcceleratorMode::Auto,
            AcceleratorArg::Cuda => AcceleratorMode::Cuda,
            AcceleratorArg::Cpu => AcceleratorMode::Cpu,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["mergerun"]).unwrap();
        assert_eq!(args.config, "config.yaml");
        assert!(args.out.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn accepts_stdin_and_overrides() {
        let args = CliArgs::try_parse_from([
            "mergerun",
            "-c",
            "-",
            "--out",
            "models/merged",
            "--accelerator",
            "cpu",
        ])
        .unwrap();

        assert_eq!(args.config, "-");
        assert_eq!(args.out.as_deref(), Some("models/merged"));
        assert_eq!(
            args.accelerator.map(AcceleratorMode::from),
            Some(AcceleratorMode::Cpu)
        );
    }
}
