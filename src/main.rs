use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docqa::cli::{Cli, Commands};
use docqa::config::DocQaConfig;
use docqa::dirs;
use docqa::documents::DocumentService;
use docqa::retrieval::{self, TextChunker};
use docqa::server::state::AppState;
use docqa::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DocQaConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            docqa::cli::serve::execute(config, host, port).await?;
        }
        Commands::Models => {
            docqa::cli::models::execute(&config);
        }
        Commands::Ask {
            question,
            model,
            session,
        } => {
            dirs::ensure_dirs()?;
            let state = AppState::from_config(config).await?;
            docqa::cli::ask::execute(&state, &question, model.as_deref(), session.as_deref())
                .await?;
        }
        // Document and session commands never touch a model backend
        Commands::Docs { command } => {
            dirs::ensure_dirs()?;
            let store = Arc::new(SqliteStore::open(&config.database_path)?);
            let retriever = retrieval::from_config(&config.retriever).await?;
            let documents = DocumentService::new(
                store,
                retriever,
                TextChunker::new(config.retriever.chunk_size, config.retriever.chunk_overlap),
            );
            docqa::cli::docs::execute(&documents, command).await?;
        }
        Commands::Sessions => {
            dirs::ensure_dirs()?;
            let store = SqliteStore::open(&config.database_path)?;
            docqa::cli::sessions::execute(&store).await?;
        }
    }

    Ok(())
}
