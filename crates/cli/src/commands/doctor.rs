//! `offerdesk doctor`: Diagnose system health.

use offerdesk_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("OfferDesk Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file — using defaults (run `offerdesk init`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 blocking issue found.");
            return Ok(());
        }
    };

    match offerdesk_store::open(&config.store).await {
        Ok(_) => println!("  [ok]   Store '{}' opened", config.store.backend),
        Err(e) => {
            println!("  [fail] Store '{}' unavailable: {e}", config.store.backend);
            issues += 1;
        }
    }

    if !config.has_api_key() {
        println!("  [warn] No API key configured — set GEMINI_API_KEY");
        issues += 1;
    } else {
        match offerdesk_providers::build_from_config(&config.model) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  [ok]   Provider '{}' reachable ({})", provider.name(), config.model.name),
                Ok(false) => {
                    println!("  [warn] Provider '{}' answered but is not healthy", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  [fail] Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  [fail] Provider not usable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
