//! `arbor config`: Configuration management commands.

use arbor_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed and validated");

            let mut warnings = Vec::new();
            if config.context.max_relevant_tools == 0 {
                warnings.push("max_relevant_tools = 0: prompts will never list tools");
            }
            if config.context.optimize_max_tokens <= config.context.reserved_tokens {
                warnings.push("optimize_max_tokens leaves no room after reserved_tokens");
            }
            if config.context.context_max_age_ms == 0 {
                warnings.push("context_max_age_ms = 0: every cleanup evicts all windows");
            }

            if !warnings.is_empty() {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Max tokens:  {}", config.context.default_max_tokens);
            println!("   Reserved:    {}", config.context.reserved_tokens);
            println!("   Margin:      {}", config.context.safety_margin);
            println!("   Storage:     {}", config.storage.backend);
            if config.storage.backend == "file" {
                println!("   Sessions:    {}", config.storage.sessions_dir().display());
            }
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}
