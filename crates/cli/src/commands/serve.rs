//! `tightfit serve`: Start the HTTP gateway and the webhook bot.

use tightfit_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📦 tightfit gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Hard limit: {} bytes", config.limits.hard_max_bytes);
    println!(
        "   Signed webhooks: {}",
        if config.gateway.webhook_secret.is_some() { "yes" } else { "no" }
    );

    tightfit_gateway::start(config).await?;

    Ok(())
}
