// src/settings/mod.rs

//! Tool settings (`Mergerun.toml`): which executable to run, how to name
//! generated destinations, and the optional startup hook.

pub mod loader;
pub mod model;

pub use loader::{default_settings_path, load_and_validate, load_from_path, resolve};
pub use model::{HookSection, OutputSection, RunnerSection, Settings};
