use std::io::Write;

use futures::StreamExt;

use crate::error::Result;
use crate::orchestrator::ChatTurnRequest;
use crate::server::state::AppState;
use crate::store::TurnStatus;

/// Execute the `ask` command: stream one answer to stdout.
pub async fn execute(
    state: &AppState,
    question: &str,
    model: Option<&str>,
    session: Option<&str>,
) -> Result<()> {
    let request = ChatTurnRequest {
        question: question.to_string(),
        session_id: session.map(str::to_string),
        model: model.map(str::to_string).unwrap_or_else(|| state.default_model()),
    };

    let mut stream = state.orchestrator.handle(request).await?;
    let completion = stream.finished();
    let session_id = stream.session_id().to_string();

    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        print!("{}", event.token);
        stdout.flush()?;
    }
    println!();

    match completion.await {
        Some(outcome) if outcome.status != TurnStatus::Complete => {
            eprintln!("[{}] session: {session_id}", outcome.status);
        }
        _ => eprintln!("session: {session_id}"),
    }
    Ok(())
}
