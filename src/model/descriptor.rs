use serde::{Deserialize, Serialize};

use crate::error::{DocQaError, Result};

/// Generation backends a model can be served by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible HTTP server (vLLM, llama.cpp server, ...)
    OpenAi,
    /// In-process deterministic backend, useful offline and in tests
    Echo,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Echo => write!(f, "echo"),
        }
    }
}

/// Sampling parameters applied to every generation job of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_repetition_penalty() -> f32 {
    1.1
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
        }
    }
}

/// Per-model overrides layered on top of the global `[generation]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingOverrides {
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub repetition_penalty: Option<f32>,
}

impl SamplingParams {
    /// Returns a copy with every field present in `overrides` replaced.
    pub fn with_overrides(&self, overrides: &SamplingOverrides) -> Self {
        Self {
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
            temperature: overrides.temperature.unwrap_or(self.temperature),
            top_p: overrides.top_p.unwrap_or(self.top_p),
            repetition_penalty: overrides
                .repetition_penalty
                .unwrap_or(self.repetition_penalty),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(DocQaError::Config("max_tokens must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DocQaError::Config(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(DocQaError::Config(format!(
                "top_p {} outside (0, 1]",
                self.top_p
            )));
        }
        if self.repetition_penalty <= 0.0 {
            return Err(DocQaError::Config(format!(
                "repetition_penalty {} must be positive",
                self.repetition_penalty
            )));
        }
        Ok(())
    }
}

/// A fully resolved model entry: identity, resource budget and sampling defaults.
///
/// Immutable once the registry has loaded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique name clients select the model by
    pub name: String,

    /// Backend serving the model
    pub backend: BackendKind,

    /// Identifier the backend knows the model as
    pub model_id: String,

    /// Base URL for HTTP backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Fraction of accelerator memory the runtime may reserve
    pub gpu_memory_utilization: f32,

    /// Number of devices the model is sharded across
    pub tensor_parallel_size: u32,

    /// Maximum context length in tokens
    pub max_model_len: usize,

    /// Maximum number of jobs running against this model at once
    pub max_num_seqs: usize,

    pub sampling: SamplingParams,
}

impl ModelDescriptor {
    /// Check resource parameters before any backend is touched.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DocQaError::Config("model name cannot be empty".to_string()));
        }
        if self.model_id.trim().is_empty() {
            return Err(DocQaError::Config(format!(
                "model '{}' has an empty model_id",
                self.name
            )));
        }
        if !(self.gpu_memory_utilization > 0.0 && self.gpu_memory_utilization <= 1.0) {
            return Err(DocQaError::Config(format!(
                "model '{}': gpu_memory_utilization {} outside (0, 1]",
                self.name, self.gpu_memory_utilization
            )));
        }
        if self.tensor_parallel_size == 0 {
            return Err(DocQaError::Config(format!(
                "model '{}': tensor_parallel_size must be at least 1",
                self.name
            )));
        }
        if self.max_model_len == 0 || self.max_num_seqs == 0 {
            return Err(DocQaError::Config(format!(
                "model '{}': max_model_len and max_num_seqs must be at least 1",
                self.name
            )));
        }
        if self.backend == BackendKind::OpenAi && self.base_url.is_none() {
            return Err(DocQaError::Config(format!(
                "model '{}': openai backend requires base_url",
                self.name
            )));
        }
        self.sampling
            .validate()
            .map_err(|e| DocQaError::Config(format!("model '{}': {e}", self.name)))
    }
}

#[cfg(test)]
pub(crate) fn echo_descriptor(name: &str) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        backend: BackendKind::Echo,
        model_id: format!("echo/{name}"),
        base_url: None,
        gpu_memory_utilization: 0.9,
        tensor_parallel_size: 1,
        max_model_len: 4096,
        max_num_seqs: 4,
        sampling: SamplingParams::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let base = SamplingParams::default();
        let merged = base.with_overrides(&SamplingOverrides {
            temperature: Some(0.1),
            ..Default::default()
        });
        assert_eq!(merged.temperature, 0.1);
        assert_eq!(merged.max_tokens, base.max_tokens);
        assert_eq!(merged.top_p, base.top_p);
    }

    #[test]
    fn test_validate_rejects_bad_memory_budget() {
        let mut descriptor = echo_descriptor("m");
        descriptor.gpu_memory_utilization = 1.5;
        assert!(matches!(descriptor.validate(), Err(DocQaError::Config(_))));
    }

    #[test]
    fn test_openai_requires_base_url() {
        let mut descriptor = echo_descriptor("m");
        descriptor.backend = BackendKind::OpenAi;
        assert!(descriptor.validate().is_err());
        descriptor.base_url = Some("http://localhost:8001".to_string());
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: BackendKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, BackendKind::OpenAi);
        assert_eq!(BackendKind::Echo.to_string(), "echo");
    }
}
