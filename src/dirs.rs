use std::path::PathBuf;

/// Returns the base directory for DocQA data.
///
/// Uses `$DOCQA_HOME` if set, otherwise defaults to `~/.docqa`.
pub fn docqa_home() -> PathBuf {
    if let Ok(home) = std::env::var("DOCQA_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docqa")
}

/// Returns the path to the SQLite database holding session logs and document records.
pub fn logs_db_path() -> PathBuf {
    docqa_home().join("session_logs_db").join("logs.db")
}

/// Returns the directory of the local full-text index.
pub fn index_path() -> PathBuf {
    docqa_home().join("index")
}

/// Returns the path to the user configuration file.
pub fn config_path() -> PathBuf {
    docqa_home().join("config.toml")
}

/// Ensure all required directories exist.
pub fn ensure_dirs() -> std::io::Result<()> {
    if let Some(parent) = logs_db_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(index_path())
}
