// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Free-form parameter table (`weight`, `density`, `t`, ...).
///
/// Values may be scalars, lists or gradient tables, so they are kept as raw
/// YAML and handed to the merge tool untouched.
pub type Parameters = BTreeMap<String, serde_yaml::Value>;

/// Merge algorithms this tool knows the input rules for.
///
/// The merge tool accepts more methods than these; an unlisted
/// `merge_method` is passed through unchecked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeMethod {
    Linear,
    Slerp,
    TaskArithmetic,
    Ties,
    DareTies,
    DareLinear,
    Passthrough,
    ModelStock,
}

impl MergeMethod {
    pub const ALL: [MergeMethod; 8] = [
        MergeMethod::Linear,
        MergeMethod::Slerp,
        MergeMethod::TaskArithmetic,
        MergeMethod::Ties,
        MergeMethod::DareTies,
        MergeMethod::DareLinear,
        MergeMethod::Passthrough,
        MergeMethod::ModelStock,
    ];

    /// The `merge_method` value as written in YAML.
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMethod::Linear => "linear",
            MergeMethod::Slerp => "slerp",
            MergeMethod::TaskArithmetic => "task_arithmetic",
            MergeMethod::Ties => "ties",
            MergeMethod::DareTies => "dare_ties",
            MergeMethod::DareLinear => "dare_linear",
            MergeMethod::Passthrough => "passthrough",
            MergeMethod::ModelStock => "model_stock",
        }
    }

    /// Whether the method combines more than two models.
    pub fn multi_model(self) -> bool {
        !matches!(self, MergeMethod::Slerp | MergeMethod::Passthrough)
    }

    /// Whether the method needs `base_model` to be set.
    pub fn uses_base_model(self) -> bool {
        !matches!(self, MergeMethod::Linear | MergeMethod::Passthrough)
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MergeMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown merge_method: {s}"))
    }
}

/// Tensor dtype accepted for `dtype` / `out_dtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Float16,
    Bfloat16,
    Float32,
}

impl Dtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Dtype::Float16 => "float16",
            Dtype::Bfloat16 => "bfloat16",
            Dtype::Float32 => "float32",
        }
    }
}

/// Top-level merge configuration as read from YAML.
///
/// Keys not modelled here are tolerated; the merge tool owns the full schema.
///
/// ```yaml
/// merge_method: slerp
/// base_model: org/model-a
/// slices:
///   - sources:
///       - model: org/model-a
///         layer_range: [0, 32]
///       - model: org/model-b
///         layer_range: [0, 32]
/// parameters:
///   t: 0.5
/// dtype: bfloat16
/// ```
///
/// This is the unchecked form; see [`MergeConfiguration`] for the validated one.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMergeConfig {
    pub merge_method: String,

    #[serde(default)]
    pub base_model: Option<String>,

    /// Whole-model inputs. Mutually exclusive with `slices`.
    #[serde(default)]
    pub models: Option<Vec<ModelEntry>>,

    /// Layer-sliced inputs. Mutually exclusive with `models`.
    #[serde(default)]
    pub slices: Option<Vec<SliceSpec>>,

    /// Per-module slice definitions, keyed by module name.
    #[serde(default)]
    pub modules: Option<BTreeMap<String, serde_yaml::Value>>,

    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub dtype: Option<Dtype>,

    #[serde(default)]
    pub out_dtype: Option<Dtype>,

    /// `tokenizer_source` may be a model name, `union` or `base`.
    #[serde(default)]
    pub tokenizer_source: Option<String>,

    /// Structured tokenizer settings (`source`, `tokens`, ...).
    #[serde(default)]
    pub tokenizer: Option<serde_yaml::Value>,

    #[serde(default)]
    pub chat_template: Option<String>,
}

/// One entry under `models:`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub model: String,

    #[serde(default)]
    pub parameters: Parameters,
}

/// One entry under `slices:`.
#[derive(Debug, Clone, Deserialize)]
pub struct SliceSpec {
    pub sources: Vec<SliceSource>,

    #[serde(default)]
    pub base_model: Option<String>,

    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub residual_weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SliceSource {
    pub model: String,

    /// `[start, end)` layer indices.
    pub layer_range: (u32, u32),

    #[serde(default)]
    pub parameters: Parameters,
}

/// A validated merge configuration.
///
/// Only constructible through [`crate::config::validate`], so holding one
/// means the schema rules have been checked. It also keeps the exact text the
/// caller submitted so it can be written into the workspace verbatim.
#[derive(Debug, Clone)]
pub struct MergeConfiguration {
    source_text: String,
    spec: RawMergeConfig,
}

impl MergeConfiguration {
    pub(crate) fn new_unchecked(source_text: String, spec: RawMergeConfig) -> Self {
        Self { source_text, spec }
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// `merge_method` exactly as written, minus surrounding whitespace.
    pub fn merge_method(&self) -> &str {
        self.spec.merge_method.trim()
    }

    /// The catalogued method, if `merge_method` names one.
    pub fn known_method(&self) -> Option<MergeMethod> {
        self.merge_method().parse().ok()
    }

    pub fn base_model(&self) -> Option<&str> {
        self.spec.base_model.as_deref()
    }

    pub fn dtype(&self) -> Option<Dtype> {
        self.spec.dtype
    }

    pub fn out_dtype(&self) -> Option<Dtype> {
        self.spec.out_dtype
    }

    /// Every distinct model referenced by the configuration, in first-seen
    /// order (base model first).
    pub fn referenced_models<'a>(&'a self) -> Vec<&'a str> {
        let mut seen: Vec<&'a str> = Vec::new();
        let mut push = |name: &'a str| {
            let name = name.trim();
            if !seen.contains(&name) {
                seen.push(name);
            }
        };

        if let Some(base) = &self.spec.base_model {
            push(base);
        }
        for entry in self.spec.models.iter().flatten() {
            push(&entry.model);
        }
        for slice in self.spec.slices.iter().flatten() {
            if let Some(base) = &slice.base_model {
                push(base);
            }
            for source in &slice.sources {
                push(&source.model);
            }
        }
        seen
    }
}
