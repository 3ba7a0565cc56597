use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dirs;
use crate::error::{DocQaError, Result};
use crate::model::descriptor::{BackendKind, ModelDescriptor, SamplingOverrides, SamplingParams};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Use the given context to answer the user's question.";

/// Settings for the DocQA server and CLI, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocQaConfig {
    /// Host address for the HTTP server (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP server (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Model used when a chat request names none
    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Capacity of each job's delta channel
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// SQLite database for session logs and document records
    #[serde(default = "dirs::logs_db_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub retriever: RetrieverConfig,

    /// Sampling defaults shared by all models
    #[serde(default)]
    pub generation: SamplingParams,

    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

/// Which retrieval oracle to use and how many passages to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    #[serde(default)]
    pub backend: RetrieverBackend,

    /// Number of passages fetched per question
    #[serde(default = "default_k")]
    pub k: usize,

    /// Base URL of a remote retrieval service (`http` backend only)
    #[serde(default)]
    pub url: Option<String>,

    /// Index directory of the `local` backend
    #[serde(default = "dirs::index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetrieverBackend {
    #[default]
    Local,
    Http,
}

/// One `[[models]]` entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub backend: BackendKind,
    pub model_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_gpu_memory_utilization")]
    pub gpu_memory_utilization: f32,
    #[serde(default = "default_tensor_parallel_size")]
    pub tensor_parallel_size: u32,
    #[serde(default = "default_max_model_len")]
    pub max_model_len: usize,
    #[serde(default = "default_max_num_seqs")]
    pub max_num_seqs: usize,
    #[serde(default)]
    pub sampling: SamplingOverrides,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_stream_buffer() -> usize {
    64
}

fn default_k() -> usize {
    2
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_gpu_memory_utilization() -> f32 {
    0.9
}

fn default_tensor_parallel_size() -> u32 {
    1
}

fn default_max_model_len() -> usize {
    101_000
}

fn default_max_num_seqs() -> usize {
    8
}

fn default_models() -> Vec<ModelConfig> {
    vec![ModelConfig {
        name: "echo".to_string(),
        backend: BackendKind::Echo,
        model_id: "echo".to_string(),
        base_url: None,
        gpu_memory_utilization: default_gpu_memory_utilization(),
        tensor_parallel_size: default_tensor_parallel_size(),
        max_model_len: default_max_model_len(),
        max_num_seqs: default_max_num_seqs(),
        sampling: SamplingOverrides::default(),
    }]
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            backend: RetrieverBackend::default(),
            k: default_k(),
            url: None,
            index_path: dirs::index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for DocQaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_model: None,
            system_prompt: default_system_prompt(),
            stream_buffer: default_stream_buffer(),
            database_path: dirs::logs_db_path(),
            retriever: RetrieverConfig::default(),
            generation: SamplingParams::default(),
            models: default_models(),
        }
    }
}

impl DocQaConfig {
    /// Load configuration from `path`, or from the default config file path.
    /// Returns default config if the default file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (dirs::config_path(), false),
        };

        let config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                DocQaError::Config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else if required {
            return Err(DocQaError::Config(format!(
                "Configuration file not found at {}",
                path.display()
            )));
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the server bind address string (e.g., "127.0.0.1:8000").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The model used when a request does not name one: `default_model`, else the first entry.
    pub fn default_model_name(&self) -> Option<&str> {
        self.default_model
            .as_deref()
            .or_else(|| self.models.first().map(|m| m.name.as_str()))
    }

    /// Resolve every `[[models]]` entry against the global sampling defaults.
    pub fn descriptors(&self) -> Vec<ModelDescriptor> {
        self.models
            .iter()
            .map(|m| ModelDescriptor {
                name: m.name.clone(),
                backend: m.backend,
                model_id: m.model_id.clone(),
                base_url: m.base_url.clone(),
                gpu_memory_utilization: m.gpu_memory_utilization,
                tensor_parallel_size: m.tensor_parallel_size,
                max_model_len: m.max_model_len,
                max_num_seqs: m.max_num_seqs,
                sampling: self.generation.with_overrides(&m.sampling),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(DocQaError::Config("at least one model must be configured".to_string()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(DocQaError::Config(format!(
                    "duplicate model name '{}'",
                    model.name
                )));
            }
        }

        if let Some(default) = &self.default_model {
            if !seen.contains(default.as_str()) {
                return Err(DocQaError::Config(format!(
                    "default_model '{default}' is not a configured model"
                )));
            }
        }

        if self.stream_buffer == 0 {
            return Err(DocQaError::Config("stream_buffer must be at least 1".to_string()));
        }
        if self.retriever.k == 0 {
            return Err(DocQaError::Config("retriever.k must be at least 1".to_string()));
        }
        if self.retriever.chunk_overlap >= self.retriever.chunk_size {
            return Err(DocQaError::Config(
                "retriever.chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.retriever.backend == RetrieverBackend::Http && self.retriever.url.is_none() {
            return Err(DocQaError::Config(
                "retriever.url is required for the http backend".to_string(),
            ));
        }

        self.generation.validate()?;
        for descriptor in self.descriptors() {
            descriptor.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DocQaConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.retriever.k, 2);
        assert_eq!(config.default_model_name(), Some("echo"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_address() {
        let config = DocQaConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
    }

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000
            default_model = "llama3.3"

            [retriever]
            k = 4

            [generation]
            max_tokens = 512
            temperature = 0.2

            [[models]]
            name = "llama3.3"
            backend = "openai"
            model_id = "meta-llama/Llama-3.3-70B-Instruct"
            base_url = "http://127.0.0.1:8001"
            tensor_parallel_size = 4

            [models.sampling]
            temperature = 0.0

            [[models]]
            name = "echo"
            backend = "echo"
            model_id = "echo"
        "#;
        let config = DocQaConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.retriever.k, 4);
        assert!(config.validate().is_ok());

        let descriptors = config.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].tensor_parallel_size, 4);
        assert_eq!(descriptors[0].sampling.temperature, 0.0);
        assert_eq!(descriptors[0].sampling.max_tokens, 512);
        assert_eq!(descriptors[1].sampling.temperature, 0.2);
        assert_eq!(descriptors[1].max_model_len, 101_000);
    }

    #[test]
    fn test_duplicate_model_names_rejected() {
        let toml_str = r#"
            [[models]]
            name = "a"
            backend = "echo"
            model_id = "echo"

            [[models]]
            name = "a"
            backend = "echo"
            model_id = "echo"
        "#;
        let config = DocQaConfig::from_toml(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(DocQaError::Config(_))));
    }

    #[test]
    fn test_unknown_default_model_rejected() {
        let config = DocQaConfig {
            default_model: Some("missing".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docqa.toml");
        std::fs::write(&path, "port = 9999\n").unwrap();

        let loaded = DocQaConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.port, 9999);

        let missing = DocQaConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(missing.is_err());
    }
}
