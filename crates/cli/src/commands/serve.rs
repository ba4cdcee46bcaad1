//! `wegweiser serve` — start the HTTP gateway.

use wegweiser_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    config.require_credentials().map_err(|e| e.to_string())?;

    println!(
        "Starting gateway on http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    wegweiser_gateway::start(config).await
}
