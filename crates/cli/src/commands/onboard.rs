//! `careers onboard`: First-time setup.

use anyhow::Context;
use careers_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("Careers: First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set OPENAI_API_KEY, or add api_key to {}", config_path.display());
    println!("   2. Run: careers ask -m \"How do I move into product management?\"");
    println!("   3. Or serve the browser UI: careers serve\n");

    Ok(())
}
