//! `wegweiser doctor` — diagnose configuration and credentials.

use wegweiser_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Wegweiser Doctor — Configuration Diagnostics");
    println!("===============================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!(
            "  ⚠️  No config file at {} — using defaults",
            config_path.display()
        );
    }

    match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            println!("     model:      {}", config.default_model);
            println!("     api_base:   {}", config.api_base);
            println!("     max_cycles: {}", config.max_cycles);
            println!("     protocol:   {:?}", config.protocol);

            if config.openai_api_key.is_some() {
                println!("  ✅ OPENAI_API_KEY configured");
            } else {
                println!("  ❌ OPENAI_API_KEY missing — the advisor cannot reach a model");
                issues += 1;
            }

            if config.tavily_api_key.is_some() {
                println!("  ✅ TAVILY_API_KEY configured");
            } else {
                println!("  ❌ TAVILY_API_KEY missing — web_search will be unavailable");
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
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
