use crate::error::Result;
use crate::store::LogStore;

/// Execute the `sessions` command: list sessions, most recent first.
pub async fn execute(store: &dyn LogStore) -> Result<()> {
    let sessions = store.sessions().await?;
    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    println!("{:<38} {:>5} {:<20} FIRST MESSAGE", "SESSION", "TURNS", "STARTED");
    for s in sessions {
        let mut first: String = s.first_message.chars().take(50).collect();
        if s.first_message.chars().count() > 50 {
            first.push_str("...");
        }
        println!(
            "{:<38} {:>5} {:<20} {}",
            s.session_id,
            s.turns,
            s.started_at.format("%Y-%m-%d %H:%M:%S"),
            first.replace('\n', " ")
        );
    }
    Ok(())
}
