// src/config/mod.rs

//! Merge configuration: the YAML document the caller submits.
//!
//! - [`model`] holds the serde types and the validated [`MergeConfiguration`].
//! - [`validate`] turns raw text into a [`MergeConfiguration`] or a
//!   [`ValidationError`](crate::errors::ValidationError).

pub mod model;
pub mod validate;

pub use model::{
    Dtype, MergeConfiguration, MergeMethod, ModelEntry, Parameters, RawMergeConfig, SliceSource,
    SliceSpec,
};
pub use validate::validate;
