//! Shared state and helpers for CLI commands.

use std::io::Read;
use std::path::{Path, PathBuf};

use acdb::config::{config_file_path, ConfigFile};
use acdb::logging::{init_logging, LoggingGuard};
use acdb::ActiveCaptainDatabase;
use clap::Args;

use crate::error::CliError;

/// Loaded configuration plus command-line overrides.
#[derive(Debug)]
pub struct Context {
    pub config: ConfigFile,
    pub config_path: PathBuf,
    verbose: bool,
}

impl Context {
    pub fn load(
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        verbose: bool,
    ) -> Result<Self, CliError> {
        let config_path = config_path.unwrap_or_else(config_file_path);
        let mut config = ConfigFile::load_from(&config_path)
            .map_err(|e| CliError::Config(e.to_string()))?;
        if let Some(dir) = data_dir {
            config.database.directory = Some(dir);
        }
        Ok(Self {
            config,
            config_path,
            verbose,
        })
    }

    pub fn init_logging(&self) -> Result<LoggingGuard, CliError> {
        let mut logging = self.config.logging.clone();
        if self.verbose {
            logging.level = "debug".to_string();
        }
        Ok(init_logging(&logging)?)
    }

    pub fn open_database(&self) -> Result<ActiveCaptainDatabase, CliError> {
        Ok(ActiveCaptainDatabase::from_config(&self.config)?)
    }
}

/// Tile coordinate arguments.
#[derive(Debug, Clone, Copy, Args)]
pub struct TileCoords {
    /// Tile column (0-15, west to east)
    #[arg(long)]
    pub tile_x: i32,

    /// Tile row (0-15, south to north)
    #[arg(long)]
    pub tile_y: i32,
}

/// Bounding box arguments in degrees.
#[derive(Debug, Clone, Copy, Args)]
pub struct BoxArgs {
    #[arg(long, allow_negative_numbers = true, default_value_t = -90.0)]
    pub south: f64,

    #[arg(long, allow_negative_numbers = true, default_value_t = -180.0)]
    pub west: f64,

    #[arg(long, allow_negative_numbers = true, default_value_t = 90.0)]
    pub north: f64,

    #[arg(long, allow_negative_numbers = true, default_value_t = 180.0)]
    pub east: f64,
}

/// Read a response body from a file, or stdin when `path` is `-`.
pub fn read_body(path: &Path) -> Result<String, CliError> {
    let result = if path == Path::new("-") {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body).map(|_| body)
    } else {
        std::fs::read_to_string(path)
    };
    result.map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_body_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("body.json");
        std::fs::write(&path, r#"{"reviewId": 1}"#).unwrap();

        assert_eq!(read_body(&path).unwrap(), r#"{"reviewId": 1}"#);
    }

    #[test]
    fn test_read_body_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = read_body(&temp.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn test_context_data_dir_override() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.ini");
        let data = temp.path().join("data");

        let context = Context::load(Some(config.clone()), Some(data.clone()), false).unwrap();
        assert_eq!(context.config_path, config);
        assert_eq!(context.config.data_directory(), data);
    }
}
