use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::backend::{Backend, BackendRegistry};
use crate::error::{DocQaError, Result};
use crate::model::descriptor::ModelDescriptor;

struct HandleInner {
    descriptor: ModelDescriptor,
    backend: Arc<dyn Backend>,
    slots: Arc<Semaphore>,
}

/// Shared, read-only reference to a loaded model.
///
/// Cloning is cheap; every clone shares the same job slots.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

impl ModelHandle {
    pub fn new(descriptor: ModelDescriptor, backend: Arc<dyn Backend>) -> Self {
        let slots = Arc::new(Semaphore::new(descriptor.max_num_seqs));
        Self {
            inner: Arc::new(HandleInner {
                descriptor,
                backend,
                slots,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.descriptor.name
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.inner.descriptor
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    /// Number of jobs that could start right now without waiting.
    pub fn available_slots(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Wait for a free job slot on this model.
    pub(crate) async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        self.inner.slots.clone().acquire_owned().await.map_err(|_| {
            DocQaError::BackendNotAvailable(format!("model '{}' is shutting down", self.name()))
        })
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name())
            .field("backend", &self.inner.backend.name())
            .finish()
    }
}

/// Every configured model, loaded at startup and fixed for the process lifetime.
pub struct ModelRegistry {
    models: HashMap<String, ModelHandle>,
}

impl ModelRegistry {
    /// Validate and load every descriptor. Any failure aborts the whole load;
    /// there is no partially loaded registry.
    pub async fn load(
        descriptors: Vec<ModelDescriptor>,
        backends: &BackendRegistry,
    ) -> Result<Self> {
        for descriptor in &descriptors {
            descriptor.validate()?;
        }

        let mut handles = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let backend = backends.get(descriptor.backend)?;
            backend.load(&descriptor).await.map_err(|e| {
                tracing::error!(model = %descriptor.name, "Failed to load model: {e}");
                e
            })?;
            handles.push(ModelHandle::new(descriptor, backend));
        }

        let registry = Self::from_handles(handles)?;
        tracing::info!(models = ?registry.names(), "Loaded model registry");
        Ok(registry)
    }

    /// Build a registry from already loaded handles.
    pub fn from_handles(handles: Vec<ModelHandle>) -> Result<Self> {
        let mut models = HashMap::with_capacity(handles.len());
        for handle in handles {
            let name = handle.name().to_string();
            if models.insert(name.clone(), handle).is_some() {
                return Err(DocQaError::Config(format!("duplicate model name '{name}'")));
            }
        }
        Ok(Self { models })
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Result<ModelHandle> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DocQaError::ModelNotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Sorted names of all loaded models.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptors of all loaded models, sorted by name.
    pub fn list(&self) -> Vec<ModelDescriptor> {
        let mut list: Vec<_> = self
            .models
            .values()
            .map(|h| h.descriptor().clone())
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn exists(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.models.len()
    }
}
