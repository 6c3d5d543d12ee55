//! `tightfit doctor`: Diagnose the local setup.

use tightfit_config::AppConfig;
use tightfit_encoders::{GhostscriptEncoder, ScratchSpace};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 tightfit Doctor - System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ℹ️  No config file at {}, using defaults", config_path.display());
    }
    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            println!(
                "     limits: hard {} / ideal {}..={} bytes",
                config.limits.hard_max_bytes,
                config.limits.ideal_min_bytes,
                config.limits.ideal_max_bytes
            );
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            issues += 1;
            AppConfig::default()
        }
    };

    // Check scratch space
    match ScratchSpace::probe(&config.encoder.scratch_dir) {
        Ok(dir) => println!("  ✅ Scratch directory writable ({})", dir.display()),
        Err(e) => {
            println!(
                "  ❌ Scratch directory {} not writable: {e}",
                config.encoder.scratch_dir.display()
            );
            issues += 1;
        }
    }

    // Check Ghostscript
    let ghostscript = GhostscriptEncoder::from_config(&config.encoder);
    match ghostscript.probe_version().await {
        Ok(version) => println!(
            "  ✅ Ghostscript {version} ({})",
            config.encoder.ghostscript_path
        ),
        Err(e) => {
            println!("  ⚠️  Ghostscript unavailable: {e}");
            println!("     PDFs will only get structural optimization");
            issues += 1;
        }
    }

    // Sessions
    match config.sessions.backend.as_str() {
        "file" => println!("  ✅ Sessions persisted to {}", config.sessions.path.display()),
        _ => println!("  ℹ️  Sessions kept in memory (opt-ins reset on restart)"),
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
