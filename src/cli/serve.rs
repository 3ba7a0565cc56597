use crate::config::DocQaConfig;
use crate::error::Result;
use crate::server;

/// Execute the `serve` command: start the HTTP server.
pub async fn execute(mut config: DocQaConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    println!("DocQA server starting...");
    println!("Listening on http://{}", config.bind_address());
    println!("Press Ctrl+C to stop");

    server::start(config).await
}
