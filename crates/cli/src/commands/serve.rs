//! `careers serve`: Start the HTTP chat gateway.

use anyhow::Context;
use careers_config::AppConfig;

pub async fn run(port_override: Option<u16>, host_override: Option<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    tracing::debug!(path = %AppConfig::config_path().display(), "Loaded config");

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Careers Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Chat:      POST /chat (SSE)");
    println!("   Model:     {}", config.default_model);

    careers_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Gateway stopped with an error")?;

    Ok(())
}
