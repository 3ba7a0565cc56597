use crate::backend::types::BackendOutput;
use crate::error::{DocQaError, Result};

/// Tracks how much of a job's output has already been emitted.
///
/// Cumulative snapshots are reduced to the unseen suffix, so every byte of
/// the response is emitted exactly once whatever shape the backend reports.
#[derive(Debug, Default)]
pub struct DeltaCursor {
    emitted: String,
}

impl DeltaCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one backend output into the cursor, returning the new fragment if any.
    pub fn advance(&mut self, output: BackendOutput) -> Result<Option<String>> {
        let delta = match output {
            BackendOutput::Delta(delta) => delta,
            BackendOutput::Cumulative(full) => {
                if !full.starts_with(&self.emitted) {
                    return Err(DocQaError::GenerationFailed(format!(
                        "cumulative output diverged after {} emitted bytes",
                        self.emitted.len()
                    )));
                }
                full[self.emitted.len()..].to_string()
            }
        };

        if delta.is_empty() {
            return Ok(None);
        }
        self.emitted.push_str(&delta);
        Ok(Some(delta))
    }

    /// Everything emitted so far.
    pub fn emitted(&self) -> &str {
        &self.emitted
    }
}
