pub mod ask;
pub mod docs;
pub mod models;
pub mod serve;
pub mod sessions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// DocQA - Ask questions about your documents
#[derive(Debug, Parser)]
#[command(name = "docqa", version, about)]
pub struct Cli {
    /// Configuration file (default: $DOCQA_HOME/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host address to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ask one question and stream the answer to stdout
    Ask {
        question: String,

        /// Model to answer with (default: the configured default model)
        #[arg(long)]
        model: Option<String>,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
    },

    /// List configured models
    Models,

    /// Manage indexed documents
    Docs {
        #[command(subcommand)]
        command: DocsCommand,
    },

    /// List chat sessions
    Sessions,
}

#[derive(Debug, Subcommand)]
pub enum DocsCommand {
    /// List uploaded documents
    List,

    /// Upload and index a .txt or .md file
    Add { path: PathBuf },

    /// Delete a document and its indexed chunks
    Delete { id: i64 },
}
