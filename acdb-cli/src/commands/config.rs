//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` commands
//! for viewing and modifying configuration settings from the command line.

use std::path::Path;

use acdb::config::{ConfigFile, ConfigKey};
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., sync.review_page_size)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., display.distance_unit)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(path, &key),
        ConfigCommands::Set { key, value } => run_set(path, &key, &value),
        ConfigCommands::List => run_list(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'acdb config list' to see available keys.",
            key
        ))
    })
}

fn run_get(path: &Path, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load_from(path).unwrap_or_default();
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let mut config = ConfigFile::load_from(path).unwrap_or_default();
    config_key
        .set(&mut config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    config.save_to(path)?;

    println!("Set {} = {}", config_key.name(), config_key.get(&config));
    Ok(())
}

fn run_list(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path).unwrap_or_default();

    println!("Configuration Settings");
    println!("======================");

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            println!();
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_get_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("acdb").join("config.ini");

        run(
            ConfigCommands::Set {
                key: "sync.review_page_size".to_string(),
                value: "25".to_string(),
            },
            &path,
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.sync.review_page_size, 25);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let err = run(
            ConfigCommands::Get {
                key: "nope.missing".to_string(),
            },
            &temp.path().join("config.ini"),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_invalid_value_not_saved() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        let err = run(
            ConfigCommands::Set {
                key: "display.distance_unit".to_string(),
                value: "furlongs".to_string(),
            },
            &path,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(!path.exists());
    }
}
