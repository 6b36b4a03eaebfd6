// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod logging;
pub mod materialize;
pub mod request;
pub mod settings;
pub mod types;

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::MergeMethod;
use crate::engine::Orchestrator;
use crate::request::{OUTPUT_DIR_NAME, RunRequestBuilder};
use crate::settings::Settings;
use crate::types::{Accelerator, AcceleratorMode};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading and accelerator detection
/// - the optional startup hook
/// - one orchestrated invocation, printed to stdout as it streams
pub async fn run(args: CliArgs) -> Result<()> {
    if args.list_methods {
        print_methods();
        return Ok(());
    }

    let settings = settings::resolve(args.settings.as_deref())?;

    let mode = args
        .accelerator
        .map(AcceleratorMode::from)
        .unwrap_or(settings.runner.accelerator);
    let accelerator = mode.resolve();
    info!(?mode, ?accelerator, "accelerator resolved");

    let raw_text = read_config_text(&args.config).await?;

    if args.dry_run {
        return print_dry_run(&settings, accelerator, &raw_text, args.out.as_deref());
    }

    if let Some(hook) = settings.hooks.on_start.as_deref() {
        run_on_start_hook(hook);
    }

    let orchestrator = Orchestrator::new(&settings, accelerator);
    let mut invocation = orchestrator.invoke(raw_text, args.out);

    while let Some(event) = invocation.next_event().await {
        println!("{event}");
    }

    let state = invocation.finish().await?;
    if !state.is_success() {
        anyhow::bail!("merge did not complete (final state: {state:?})");
    }
    Ok(())
}

async fn read_config_text(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("reading merge configuration from stdin")?;
        return Ok(text);
    }

    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("reading merge configuration {source:?}"))
}

/// Fire-and-forget startup command (e.g. open a dashboard in a browser).
fn run_on_start_hook(hook: &str) {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(hook);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(hook);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    match cmd.spawn() {
        Ok(_child) => debug!(hook, "on_start hook launched"),
        Err(e) => warn!(hook, error = %e, "failed to launch on_start hook"),
    }
}

/// Validate and print what would run, without creating anything.
fn print_dry_run(
    settings: &Settings,
    accelerator: Accelerator,
    raw_text: &str,
    out: Option<&str>,
) -> Result<()> {
    let config = config::validate(raw_text).context("invalid merge configuration")?;
    let builder = RunRequestBuilder::new(settings, accelerator);
    let (destination, generated) = builder.resolve_destination(&config, out)?;

    println!("mergerun dry-run");
    println!("  merge_method = {}", config.merge_method());
    if config.known_method().is_none() {
        println!("    (not catalogued; inputs are checked by the merge tool)");
    }
    if let Some(base) = config.base_model() {
        println!("  base_model = {base}");
    }
    if let Some(dtype) = config.dtype() {
        println!("  dtype = {}", dtype.as_str());
    }
    if let Some(out_dtype) = config.out_dtype() {
        println!("  out_dtype = {}", out_dtype.as_str());
    }
    println!("  models:");
    for model in config.referenced_models() {
        println!("    - {model}");
    }
    println!();

    println!("  accelerator = {accelerator:?}");
    println!(
        "  command = {} {}",
        settings.runner.command,
        request::command_args(accelerator).join(" ")
    );
    println!("  cwd = <workspace>/merged");
    println!("  {} = <workspace>/.cache", settings.runner.cache_env);
    println!("  output = <workspace>/merged/{OUTPUT_DIR_NAME}");
    println!(
        "  destination = {}{}",
        destination.display(),
        if generated { " (generated)" } else { "" }
    );

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_methods() {
    println!("{:<18} {:<12} {:<15}", "merge_method", "multi-model", "uses base model");
    for method in MergeMethod::ALL {
        println!(
            "{:<18} {:<12} {:<15}",
            method.as_str(),
            yes_no(method.multi_model()),
            yes_no(method.uses_base_model())
        );
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
