pub mod builders;
pub mod fake_backend;

pub use builders::{MergeConfigBuilder, linear_config};
pub use fake_backend::FakeBackend;

use std::sync::Arc;

use mergerun::engine::Orchestrator;
use mergerun::request::RunRequestBuilder;
use mergerun::settings::Settings;
use mergerun::types::Accelerator;

/// Orchestrator driving `backend`, with synthesized destinations rooted at
/// `cwd`.
pub fn orchestrator_with(backend: &FakeBackend, cwd: &std::path::Path) -> Orchestrator {
    let builder = RunRequestBuilder::new(&Settings::default(), Accelerator::Cpu).with_cwd(cwd);
    Orchestrator::with_backend(builder, Arc::new(backend.clone()))
}
