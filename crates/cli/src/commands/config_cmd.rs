//! `tightfit config`: Configuration management commands.

use tightfit_config::AppConfig;

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed and validated");

            let mut warnings = Vec::new();

            if config.gateway.host == "0.0.0.0" && config.gateway.webhook_secret.is_none() {
                warnings.push("Gateway listens publicly without a webhook secret");
            }

            if config.encoder.timeout_secs > 600 {
                warnings.push("Encoder timeout above 10 minutes; a stuck Ghostscript blocks a chat that long");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!(
                "   Limits:    hard {} / ideal {}..={}",
                config.limits.hard_max_bytes,
                config.limits.ideal_min_bytes,
                config.limits.ideal_max_bytes
            );
            println!("   Encoder:   {} (timeout {}s)", config.encoder.ghostscript_path, config.encoder.timeout_secs);
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Sessions:  {}", config.sessions.backend);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_toml());
    Ok(())
}

pub fn print_default() {
    println!("{}", AppConfig::default_toml());
}

pub fn path() {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = tightfit_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
