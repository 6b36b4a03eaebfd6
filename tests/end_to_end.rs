#![cfg(unix)]

mod common;
use crate::common::{errors, init_tracing, messages_starting_with};

use std::error::Error;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use mergerun::engine::{InvocationState, Orchestrator};
use mergerun::request::RunRequestBuilder;
use mergerun::settings::Settings;
use mergerun::types::Accelerator;
use mergerun_test_utils::linear_config;

type TestResult = Result<(), Box<dyn Error>>;

/// Stand-in for the merge tool: checks its arguments, then writes a small
/// model tree under `merge/`.
const FAKE_TOOL: &str = r#"#!/bin/sh
[ "$1" = "config.yaml" ] || { echo "unexpected config arg: $1" >&2; exit 64; }
[ -f "$1" ] || { echo "config missing" >&2; exit 65; }
out="$2"
mkdir -p "$out/tokenizer"
printf 'weights' > "$out/model.safetensors"
printf '{}' > "$out/tokenizer/tokenizer.json"
echo "cache at $HF_HOME"
echo "merge complete" >&2
"#;

fn install_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-mergekit-yaml");
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn orchestrator_for(command: &Path, cwd: &Path) -> Orchestrator {
    let mut settings = Settings::default();
    settings.runner.command = command.display().to_string();
    let builder = RunRequestBuilder::new(&settings, Accelerator::Cuda).with_cwd(cwd);
    Orchestrator::with_backend(builder, std::sync::Arc::new(mergerun::exec::RealProcessBackend))
}

#[tokio::test]
async fn real_process_merge_is_materialized() -> TestResult {
    init_tracing();
    let tools = tempfile::tempdir()?;
    let cwd = tempfile::tempdir()?;
    let dest = cwd.path().join("merged-model");
    let tool = install_tool(tools.path(), FAKE_TOOL);

    let (events, state) = orchestrator_for(&tool, cwd.path())
        .invoke(linear_config(), Some(dest.display().to_string()))
        .collect()
        .await?;

    assert_eq!(state, InvocationState::Completed, "events: {events:#?}");
    assert!(errors(&events).is_empty());

    let cache_line = messages_starting_with(&events, "cache at ");
    assert_eq!(cache_line.len(), 1);
    assert!(cache_line[0].ends_with("/.cache"));
    assert_eq!(messages_starting_with(&events, "merge complete").len(), 1);

    assert_eq!(messages_starting_with(&events, "Copied ").len(), 3);
    assert_eq!(fs::read_to_string(dest.join("merge/model.safetensors"))?, "weights");
    assert_eq!(fs::read_to_string(dest.join("merge/tokenizer/tokenizer.json"))?, "{}");
    assert_eq!(fs::read_to_string(dest.join("config.yaml"))?, linear_config());
    Ok(())
}

#[tokio::test]
async fn failing_tool_is_merge_failed() -> TestResult {
    init_tracing();
    let tools = tempfile::tempdir()?;
    let cwd = tempfile::tempdir()?;
    let dest = cwd.path().join("never");
    let tool = install_tool(tools.path(), "#!/bin/sh\necho 'out of memory' >&2\nexit 137\n");

    let (events, state) = orchestrator_for(&tool, cwd.path())
        .invoke(linear_config(), Some(dest.display().to_string()))
        .collect()
        .await?;

    assert_eq!(state, InvocationState::MergeFailed);
    let errs = errors(&events);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].message, "Merge failed (exit code 137).");
    assert_eq!(messages_starting_with(&events, "out of memory").len(), 1);
    assert!(!dest.exists());
    Ok(())
}

#[tokio::test]
async fn missing_tool_is_spawn_failed() -> TestResult {
    init_tracing();
    let cwd = tempfile::tempdir()?;
    let dest = cwd.path().join("never");
    let missing = cwd.path().join("bin").join("mergekit-yaml");

    let (events, state) = orchestrator_for(&missing, cwd.path())
        .invoke(linear_config(), Some(dest.display().to_string()))
        .collect()
        .await?;

    assert_eq!(state, InvocationState::SpawnFailed);
    let errs = errors(&events);
    assert_eq!(errs.len(), 1);
    assert!(errs[0].message.starts_with("failed to start `"));
    assert!(messages_starting_with(&events, "Copied ").is_empty());
    assert!(!dest.exists());
    Ok(())
}

/// Whether `pid` is still a live (non-zombie) process.
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // Field 3, after the parenthesised command name.
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next());
    !matches!(state, Some('Z') | Some('X') | None)
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn dropping_the_stream_kills_the_merge_process() -> TestResult {
    init_tracing();
    let tools = tempfile::tempdir()?;
    let cwd = tempfile::tempdir()?;
    let dest = cwd.path().join("never");
    let pidfile = tools.path().join("tool.pid");
    let body = format!(
        "#!/bin/sh\necho $$ > '{}'\necho ready\nexec sleep 30\n",
        pidfile.display()
    );
    let tool = install_tool(tools.path(), &body);

    let mut invocation = orchestrator_for(&tool, cwd.path())
        .invoke(linear_config(), Some(dest.display().to_string()));

    let mut workspace = None;
    while let Some(event) = invocation.next_event().await {
        if let Some(path) = event.message.strip_prefix("Merge configuration saved in ") {
            // <workspace>/merged/config.yaml
            workspace = Path::new(path).ancestors().nth(2).map(Path::to_path_buf);
        }
        if event.message == "ready" {
            break;
        }
    }
    let workspace = workspace.expect("workspace path was reported");
    let pid: u32 = fs::read_to_string(&pidfile)?.trim().parse()?;
    assert!(process_alive(pid));

    drop(invocation);

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while (process_alive(pid) || workspace.exists()) && std::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }

    assert!(!process_alive(pid), "merge process {pid} survived abandonment");
    assert!(!workspace.exists());
    assert!(!dest.exists());
    Ok(())
}
