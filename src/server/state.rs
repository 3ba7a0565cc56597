use std::sync::Arc;

use crate::backend::{self, BackendRegistry};
use crate::config::DocQaConfig;
use crate::documents::DocumentService;
use crate::engine::GenerationEngine;
use crate::error::Result;
use crate::model::registry::ModelRegistry;
use crate::orchestrator::ChatOrchestrator;
use crate::retrieval::{self, Retriever, TextChunker};
use crate::store::{LogStore, SqliteStore};

/// Shared application state accessible to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub documents: Arc<DocumentService>,
    pub store: Arc<dyn LogStore>,
    pub config: Arc<DocQaConfig>,
}

impl AppState {
    /// Wire the components together around an already loaded registry.
    pub fn new(
        config: DocQaConfig,
        registry: Arc<ModelRegistry>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn LogStore>,
    ) -> Self {
        let orchestrator = ChatOrchestrator::new(
            registry,
            GenerationEngine::new(config.stream_buffer),
            retriever.clone(),
            store.clone(),
            config.system_prompt.clone(),
            config.retriever.k,
        );
        let documents = DocumentService::new(
            store.clone(),
            retriever,
            TextChunker::new(config.retriever.chunk_size, config.retriever.chunk_overlap),
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            documents: Arc::new(documents),
            store,
            config: Arc::new(config),
        }
    }

    /// Open the store and index and load every configured model.
    pub async fn from_config(config: DocQaConfig) -> Result<Self> {
        Self::from_config_with_backends(config, &backend::default_backends()).await
    }

    pub async fn from_config_with_backends(
        config: DocQaConfig,
        backends: &BackendRegistry,
    ) -> Result<Self> {
        let store: Arc<dyn LogStore> = Arc::new(SqliteStore::open(&config.database_path)?);
        let retriever = retrieval::from_config(&config.retriever).await?;
        tracing::info!(
            store = store.backend_name(),
            retriever = retriever.name(),
            backends = ?backends.list_names(),
            "Initialized storage"
        );

        let registry = ModelRegistry::load(config.descriptors(), backends).await?;

        Ok(Self::new(config, Arc::new(registry), retriever, store))
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.orchestrator.registry()
    }

    /// Model used when a request does not name one.
    pub fn default_model(&self) -> String {
        self.config
            .default_model_name()
            .map(str::to_string)
            .unwrap_or_default()
    }
}
