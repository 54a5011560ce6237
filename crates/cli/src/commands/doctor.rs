//! `promptsmith doctor`: diagnose configuration, backends and storage.

use promptsmith_config::AppConfig;
use promptsmith_core::session::BackendKind;
use promptsmith_engine::credential_env;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Promptsmith Doctor");
    println!("==================\n");

    let mut issues = 0;

    let config_path = std::env::var("PROMPTSMITH_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| AppConfig::config_dir().join("config.toml"));
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `promptsmith init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  1 blocking issue found.");
            return Ok(());
        }
    };

    for backend in BackendKind::ALL {
        if config.backend_available(backend) {
            println!("  ✅ Backend {backend} available");
        } else {
            let hint = credential_env(backend).unwrap_or("an api_key");
            println!("  ⚠️  Backend {backend} not configured (set {hint})");
            if backend == config.default_backend {
                issues += 1;
            }
        }
    }
    println!("     Default backend: {}", config.default_backend);

    match promptsmith_knowledge::open_from_config(&config).await {
        Ok(kb) => match kb.health_check().await {
            Ok(true) => println!("  ✅ Knowledge Base reachable ({})", kb.name()),
            Ok(false) | Err(_) => {
                println!("  ❌ Knowledge Base opened but failed its health check");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Knowledge Base unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
