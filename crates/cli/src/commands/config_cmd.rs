//! `careers config`: Configuration management commands.

use anyhow::Context;
use careers_config::AppConfig;

pub fn validate() -> anyhow::Result<()> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.default_model);
    println!(
        "   Session:   {} steps, {}s budget",
        config.session.max_steps, config.session.time_budget_secs
    );
    println!(
        "   Gateway:   {}:{}",
        config.gateway.host, config.gateway.port
    );

    Ok(())
}

/// Problems that do not stop the config from loading but will bite later.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No API key set (set OPENAI_API_KEY or CAREERS_API_KEY)");
    }

    if config.gateway.allowed_origins.is_empty() {
        warnings.push("No CORS origins allowed; browsers on other origins cannot call /chat");
    }

    if config.gateway.allowed_origins.iter().any(|o| o == "*") && config.gateway.host == "0.0.0.0" {
        warnings.push("Gateway is public and accepts requests from any origin");
    }

    warnings
}

pub fn show() -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    redact(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn redact(config: &mut AppConfig) {
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
}

pub fn path() {
    println!("{}", AppConfig::config_path().display());
}
