#![allow(dead_code)]

use std::sync::Once;

use mergerun::events::LogEvent;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

pub fn errors(events: &[LogEvent]) -> Vec<&LogEvent> {
    events.iter().filter(|e| e.is_error()).collect()
}

pub fn messages_starting_with<'a>(events: &'a [LogEvent], prefix: &str) -> Vec<&'a str> {
    events
        .iter()
        .map(|e| e.message.as_str())
        .filter(|m| m.starts_with(prefix))
        .collect()
}
