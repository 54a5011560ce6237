//! `promptsmith init`: write the default configuration file.

use promptsmith_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually, or re-run with --force to overwrite it.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set GOOGLE_API_KEY or OPENAI_API_KEY, or add an api_key under [providers.*]");
    println!("  2. Try it without credentials: promptsmith refine \"Explain TCP handshakes\" --backend offline");
    println!("  3. Serve the API: promptsmith serve");

    Ok(())
}
