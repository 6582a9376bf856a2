use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("logstitch").join("config.yml"))
        .unwrap_or_else(|| PathBuf::from("/etc/logstitch/config.yml"))
}

pub fn init(stdout: bool, path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = path.unwrap_or_else(default_config_path);
    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());
    let config = crate::config::load_config(&path)?;
    println!(
        "Config is valid: {} server(s), http receiver {}",
        config.servers.len(),
        if config.has_http() { "enabled" } else { "disabled" }
    );
    Ok(())
}
