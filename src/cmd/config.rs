//! Configuration view and validation commands: `fera config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

fn print_toml(toml: &fera::config::FeraToml) {
    println!("[server]");
    println!("  port = {}", toml.server.port);
    println!("  host = \"{}\"", toml.server.host);
    println!("  db_path = \"{}\"", toml.server.db_path.display());
    println!("  dev_mode = {}", toml.server.dev_mode);
    println!();
    println!("[toasts]");
    println!("  ttl_ms = {}", toml.toasts.ttl_ms);
    println!("  sweep_interval_ms = {}", toml.toasts.sweep_interval_ms);
    println!();
    println!("[reports]");
    println!("  monthly_goal = {}", toml.reports.monthly_goal);
    println!();
    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  format = \"{}\"", toml.logging.format);
    if let Some(file) = &toml.logging.file {
        println!("  file = \"{}\"", file.display());
    }
    println!();
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use fera::config::{CONFIG_FILE, FeraConfig, FeraToml, get_fera_dir};

    let fera_dir = get_fera_dir(project_dir);
    let config_path = fera_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("FERA Configuration");
            println!("==================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_toml(&FeraToml::load(&config_path)?);
            } else {
                println!("No fera.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_toml(&FeraToml::default());
                println!("Run 'fera config init' to create a fera.toml file.");
                println!();
            }

            // Effective values include FERA_* environment overrides.
            let config = FeraConfig::new(project_dir.to_path_buf())?;
            println!("Effective values (with env overrides):");
            println!("  port = {}", config.toml.server.port);
            println!("  db_path = \"{}\"", config.db_path().display());
            println!("  log level = \"{}\"", config.toml.logging.level);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No fera.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = FeraToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("fera.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&fera_dir)?;
            FeraToml::default().save(&config_path)?;

            println!("Created fera.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] port, host, db_path, dev_mode");
            println!("  - [toasts] ttl_ms, sweep_interval_ms");
            println!("  - [reports] monthly_goal");
            println!("  - [logging] level, format, file");
            println!();
        }
    }

    Ok(())
}
