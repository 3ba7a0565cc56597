pub mod echo;
pub mod openai;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DocQaError, Result};
use crate::model::descriptor::{BackendKind, ModelDescriptor};

use types::{BackendStream, ChatRequest};

/// Trait for generation backends that can serve configured models.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Prepare the model for inference. Called once per model at startup;
    /// an error here prevents the process from starting.
    async fn load(&self, descriptor: &ModelDescriptor) -> Result<()>;

    /// Run chat inference, returning a stream of outputs.
    ///
    /// Errors returned here happen before any text was produced; errors
    /// yielded by the stream happen mid-generation.
    async fn chat(&self, descriptor: &ModelDescriptor, request: ChatRequest)
        -> Result<BackendStream>;
}

/// Registry of available generation backends, keyed by kind.
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: BackendKind, backend: Arc<dyn Backend>) {
        self.backends.insert(kind, backend);
    }

    /// Find the backend serving `kind`.
    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn Backend>> {
        self.backends.get(&kind).cloned().ok_or_else(|| {
            DocQaError::BackendNotAvailable(format!("No backend registered for kind: {kind}"))
        })
    }

    /// List all registered backend names.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.values().map(|b| b.name()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a `BackendRegistry` with all available backends pre-registered.
pub fn default_backends() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(BackendKind::OpenAi, Arc::new(openai::OpenAiBackend::new()));
    registry.register(BackendKind::Echo, Arc::new(echo::EchoBackend::new()));
    registry
}
