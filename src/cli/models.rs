use crate::config::DocQaConfig;

/// Execute the `models` command: list configured models.
///
/// Reads the config only; no backend is contacted.
pub fn execute(config: &DocQaConfig) {
    let descriptors = config.descriptors();
    let default = config.default_model_name().unwrap_or_default();

    println!(
        "{:<20} {:<8} {:<40} {:>10} {:>6}",
        "NAME", "BACKEND", "MODEL ID", "CONTEXT", "SEQS"
    );
    for d in &descriptors {
        let marker = if d.name == default { "*" } else { "" };
        println!(
            "{:<20} {:<8} {:<40} {:>10} {:>6}",
            format!("{}{marker}", d.name),
            d.backend.to_string(),
            d.model_id,
            d.max_model_len,
            d.max_num_seqs
        );
    }
}
