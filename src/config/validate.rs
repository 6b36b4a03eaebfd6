// src/config/validate.rs

use crate::config::model::{MergeConfiguration, MergeMethod, RawMergeConfig};
use crate::errors::ValidationError;

type Result<T> = std::result::Result<T, ValidationError>;

/// Parse and validate caller-supplied YAML into a [`MergeConfiguration`].
///
/// - Empty text or malformed YAML is a [`ValidationError::Parse`].
/// - Well-formed YAML that does not describe a merge is a
///   [`ValidationError::Schema`].
///
/// Pure: no filesystem or process access.
pub fn validate(raw_text: &str) -> Result<MergeConfiguration> {
    if raw_text.trim().is_empty() {
        return Err(ValidationError::Parse(
            "configuration is empty".to_string(),
        ));
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(raw_text).map_err(|e| ValidationError::Parse(e.to_string()))?;

    if !value.is_mapping() {
        return Err(ValidationError::Schema(format!(
            "top level must be a mapping of merge settings, got {}",
            describe(&value)
        )));
    }

    let raw: RawMergeConfig =
        serde_yaml::from_value(value).map_err(|e| ValidationError::Schema(e.to_string()))?;

    MergeConfiguration::try_from((raw_text, raw))
}

impl TryFrom<(&str, RawMergeConfig)> for MergeConfiguration {
    type Error = ValidationError;

    fn try_from((text, raw): (&str, RawMergeConfig)) -> Result<Self> {
        validate_raw_config(&raw)?;
        Ok(MergeConfiguration::new_unchecked(text.to_string(), raw))
    }
}

fn validate_raw_config(cfg: &RawMergeConfig) -> Result<()> {
    if cfg.merge_method.trim().is_empty() {
        return Err(schema("`merge_method` must not be empty"));
    }
    validate_inputs_present(cfg)?;
    validate_base_model(cfg)?;
    validate_models(cfg)?;
    validate_slices(cfg)?;
    Ok(())
}

fn validate_inputs_present(cfg: &RawMergeConfig) -> Result<()> {
    let given = [
        cfg.models.is_some(),
        cfg.slices.is_some(),
        cfg.modules.is_some(),
    ]
    .into_iter()
    .filter(|&g| g)
    .count();

    match given {
        0 => return Err(schema("one of `models`, `slices` or `modules` must be given")),
        1 => {}
        _ => {
            return Err(schema(
                "`models`, `slices` and `modules` are mutually exclusive",
            ));
        }
    }

    if cfg.models.as_ref().is_some_and(Vec::is_empty) {
        return Err(schema("`models` must not be empty"));
    }
    if cfg.slices.as_ref().is_some_and(Vec::is_empty) {
        return Err(schema("`slices` must not be empty"));
    }
    if cfg.modules.as_ref().is_some_and(|m| m.is_empty()) {
        return Err(schema("`modules` must not be empty"));
    }
    Ok(())
}

/// Only catalogued methods are checked; the merge tool judges the rest.
fn validate_base_model(cfg: &RawMergeConfig) -> Result<()> {
    let Ok(method) = cfg.merge_method.parse::<MergeMethod>() else {
        return Ok(());
    };
    let named = |b: &Option<String>| b.as_deref().is_some_and(|b| !b.trim().is_empty());
    let has_base = named(&cfg.base_model)
        || cfg
            .slices
            .iter()
            .flatten()
            .any(|slice| named(&slice.base_model));

    if method.uses_base_model() && !has_base {
        return Err(schema(&format!(
            "merge_method '{method}' requires `base_model`"
        )));
    }
    Ok(())
}

fn validate_models(cfg: &RawMergeConfig) -> Result<()> {
    for (idx, entry) in cfg.models.iter().flatten().enumerate() {
        if entry.model.trim().is_empty() {
            return Err(schema(&format!("models[{idx}].model must not be empty")));
        }
    }
    Ok(())
}

fn validate_slices(cfg: &RawMergeConfig) -> Result<()> {
    for (idx, slice) in cfg.slices.iter().flatten().enumerate() {
        if slice.sources.is_empty() {
            return Err(schema(&format!("slices[{idx}].sources must not be empty")));
        }
        for (src_idx, source) in slice.sources.iter().enumerate() {
            if source.model.trim().is_empty() {
                return Err(schema(&format!(
                    "slices[{idx}].sources[{src_idx}].model must not be empty"
                )));
            }
            let (start, end) = source.layer_range;
            if start >= end {
                return Err(schema(&format!(
                    "slices[{idx}].sources[{src_idx}].layer_range [{start}, {end}] is empty"
                )));
            }
        }
    }
    Ok(())
}

fn schema(msg: &str) -> ValidationError {
    ValidationError::Schema(msg.to_string())
}

fn describe(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
