#![allow(dead_code)]

/// Builder for merge configuration YAML text.
pub struct MergeConfigBuilder {
    method: String,
    base_model: Option<String>,
    models: Vec<String>,
    dtype: Option<String>,
}

impl MergeConfigBuilder {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            base_model: None,
            models: Vec::new(),
            dtype: None,
        }
    }

    pub fn base_model(mut self, name: &str) -> Self {
        self.base_model = Some(name.to_string());
        self
    }

    pub fn model(mut self, name: &str) -> Self {
        self.models.push(name.to_string());
        self
    }

    pub fn dtype(mut self, dtype: &str) -> Self {
        self.dtype = Some(dtype.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut yaml = format!("merge_method: {}\n", self.method);
        if let Some(base) = &self.base_model {
            yaml.push_str(&format!("base_model: {base}\n"));
        }
        yaml.push_str("models:\n");
        for model in &self.models {
            yaml.push_str(&format!("  - model: {model}\n    parameters:\n      weight: 0.5\n"));
        }
        if let Some(dtype) = &self.dtype {
            yaml.push_str(&format!("dtype: {dtype}\n"));
        }
        yaml
    }
}

/// A valid two-model linear merge.
pub fn linear_config() -> String {
    MergeConfigBuilder::new("linear")
        .model("org/model-a")
        .model("org/model-b")
        .dtype("float16")
        .build()
}
