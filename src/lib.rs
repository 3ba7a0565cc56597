//! # docqa
//!
//! Retrieval-augmented question answering over uploaded documents, with
//! answers streamed token by token.
//!
//! ## Overview
//!
//! A chat turn flows through five pieces:
//!
//! - **Retriever** finds the passages most relevant to the question
//! - **ModelRegistry** holds every configured model, loaded once at startup
//! - **prompt::assemble** builds the system turn, session history and question
//! - **GenerationEngine** runs one cancellable job per turn, emitting deltas
//! - **LogStore** records exactly one transcript entry per turn, after the
//!   stream has ended
//!
//! [`ChatOrchestrator`] ties them together. The `server` module exposes it
//! over HTTP with server-sent events and the `cli` module from the terminal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use docqa::{ChatOrchestrator, ChatTurnRequest, DocQaConfig, GenerationEngine, ModelRegistry};
//! use docqa::retrieval::LocalRetriever;
//! use docqa::store::MemoryStore;
//!
//! # async fn example() -> docqa::Result<()> {
//! let config = DocQaConfig::default();
//! let registry = ModelRegistry::load(config.descriptors(), &docqa::backend::default_backends()).await?;
//! let orchestrator = ChatOrchestrator::new(
//!     Arc::new(registry),
//!     GenerationEngine::new(config.stream_buffer),
//!     Arc::new(LocalRetriever::in_memory()?),
//!     Arc::new(MemoryStore::new()),
//!     config.system_prompt.clone(),
//!     config.retriever.k,
//! );
//!
//! let mut stream = orchestrator
//!     .handle(ChatTurnRequest {
//!         question: "What is X?".to_string(),
//!         session_id: None,
//!         model: "echo".to_string(),
//!     })
//!     .await?;
//! while let Some(event) = stream.next().await {
//!     print!("{}", event.token);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backend;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod documents;
pub mod engine;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod store;

// Re-export core types
pub use config::DocQaConfig;
pub use engine::{GenerationEngine, GenerationJob, GenerationRequest, JobHandle, TokenStream};
pub use error::{DocQaError, Result};
pub use model::{ModelDescriptor, ModelHandle, ModelRegistry};
pub use orchestrator::{ChatEvent, ChatOrchestrator, ChatStream, ChatTurnRequest, TurnOutcome};
pub use retrieval::{Passage, Retriever};
pub use store::{LogRecord, LogStore, TurnStatus};
