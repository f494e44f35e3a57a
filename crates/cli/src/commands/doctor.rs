//! `cartloop doctor`: Diagnose configuration and provider health.

use cartloop_config::{AppConfig, ExporterKind};
use cartloop_core::Provider;
use std::time::Duration;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Cartloop Doctor: Diagnostics");
    println!("============================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults; run `cartloop onboard`");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found.");
            return Ok(());
        }
    };

    println!("     model:    {}", config.default_model);
    println!("     endpoint: {}", config.provider.base_url);

    if config.has_api_key() {
        println!("  ✅ Oracle API key configured");
    } else {
        println!("  ⚠️  No oracle API key; set OPENAI_API_KEY or CARTLOOP_API_KEY");
        issues += 1;
    }

    if config.commerce.api_key.is_some() {
        println!("  ✅ Payment API key configured");
    } else {
        println!("  ⚠️  No payment API key; set STRIPE_SECRET_KEY or use `chat --offline`");
        issues += 1;
    }

    match config.telemetry.exporter {
        _ if !config.telemetry.enabled => println!("  ✅ Telemetry disabled"),
        ExporterKind::None => println!("  ✅ Telemetry in memory only"),
        ExporterKind::Jsonl => println!(
            "  ✅ Telemetry to {}",
            config.telemetry.jsonl_path.display()
        ),
        ExporterKind::Http => println!(
            "  ✅ Telemetry to {}",
            config.telemetry.endpoint.as_deref().unwrap_or_default()
        ),
    }

    match cartloop_providers::build_from_config(&config) {
        Ok(provider) => {
            let health = tokio::time::timeout(Duration::from_secs(10), provider.health_check()).await;
            match health {
                Ok(Ok(true)) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(Ok(false)) => {
                    println!("  ❌ Provider '{}' rejected the health check", provider.name());
                    issues += 1;
                }
                Ok(Err(e)) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
                Err(_) => {
                    println!("  ❌ Provider '{}' health check timed out", provider.name());
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Provider not usable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
