use std::path::Path;

use crate::documents::DocumentService;
use crate::error::{DocQaError, Result};

use super::DocsCommand;

/// Execute a `docs` subcommand.
pub async fn execute(documents: &DocumentService, command: DocsCommand) -> Result<()> {
    match command {
        DocsCommand::List => list(documents).await,
        DocsCommand::Add { path } => add(documents, &path).await,
        DocsCommand::Delete { id } => {
            documents.delete(id).await?;
            println!("Deleted document {id}");
            Ok(())
        }
    }
}

async fn list(documents: &DocumentService) -> Result<()> {
    let docs = documents.list().await?;
    if docs.is_empty() {
        println!("No documents uploaded.");
        return Ok(());
    }

    println!("{:<6} {:<40} UPLOADED", "ID", "FILENAME");
    for doc in docs {
        println!(
            "{:<6} {:<40} {}",
            doc.id,
            doc.filename,
            doc.upload_timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn add(documents: &DocumentService, path: &Path) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DocQaError::UnsupportedDocument(path.display().to_string()))?;
    let bytes = tokio::fs::read(path).await?;

    let record = documents.upload(filename, &bytes).await?;
    println!("Uploaded {} as document {}", record.filename, record.id);
    Ok(())
}
