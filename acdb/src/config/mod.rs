//! INI configuration file.
//!
//! ```ini
//! [database]
//! directory = /var/lib/acdb
//! language = en_US
//!
//! [display]
//! coordinate_format = degrees-minutes
//! date_format = month-abbreviated
//! distance_unit = feet
//!
//! [sync]
//! max_result_count = 100
//! review_page_size = 10
//! max_search_results = 100
//! min_search_length = 3
//!
//! [logging]
//! level = info
//! directory = /var/log/acdb
//! ```
//!
//! Every key is optional. A missing file is the same as an empty one.

mod display;

pub use display::{CoordinateFormat, DateFormat, DisplaySettings, DistanceUnit};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use ini::Ini;
use regex::Regex;
use tracing::debug;

use crate::error::{AcdbError, AcdbResult};

/// Language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "en_US";

/// Page size the sync service uses for incremental requests.
pub const DEFAULT_MAX_RESULT_COUNT: usize = 100;

pub const DEFAULT_REVIEW_PAGE_SIZE: u32 = 10;

pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 100;

/// Shortest name fragment worth searching for.
pub const DEFAULT_MIN_SEARCH_LENGTH: usize = 3;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Data directory; the platform data directory when unset.
    pub directory: Option<PathBuf>,
    /// Language code in `xx_YY` form.
    pub language: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            directory: None,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_result_count: usize,
    pub review_page_size: u32,
    pub max_search_results: usize,
    pub min_search_length: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_result_count: DEFAULT_MAX_RESULT_COUNT,
            review_page_size: DEFAULT_REVIEW_PAGE_SIZE,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            min_search_length: DEFAULT_MIN_SEARCH_LENGTH,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Directory for a daily log file; stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub database: DatabaseConfig,
    pub display: DisplaySettings,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Default configuration file location.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acdb")
        .join("config.ini")
}

/// Default data directory when `database.directory` is unset.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acdb")
}

impl ConfigFile {
    /// Load from [`config_file_path`].
    pub fn load() -> AcdbResult<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> AcdbResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| {
            AcdbError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to [`config_file_path`], creating its directory.
    pub fn save(&self) -> AcdbResult<()> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> AcdbResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AcdbError::storage(parent, e))?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path)
            .map_err(|e| AcdbError::storage(path, e))
    }

    /// Value of a `section.key` setting as text.
    pub fn get(&self, key: &str) -> AcdbResult<String> {
        Ok(key.parse::<ConfigKey>()?.get(self))
    }

    /// Set a `section.key` setting from text.
    pub fn set(&mut self, key: &str, value: &str) -> AcdbResult<()> {
        key.parse::<ConfigKey>()?.set(self, value)
    }

    /// Configured data directory or the platform default.
    pub fn data_directory(&self) -> PathBuf {
        self.database
            .directory
            .clone()
            .unwrap_or_else(default_data_dir)
    }
}

/// A settable configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    DatabaseDirectory,
    DatabaseLanguage,
    DisplayCoordinateFormat,
    DisplayDateFormat,
    DisplayDistanceUnit,
    SyncMaxResultCount,
    SyncReviewPageSize,
    SyncMaxSearchResults,
    SyncMinSearchLength,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::DatabaseDirectory,
            Self::DatabaseLanguage,
            Self::DisplayCoordinateFormat,
            Self::DisplayDateFormat,
            Self::DisplayDistanceUnit,
            Self::SyncMaxResultCount,
            Self::SyncReviewPageSize,
            Self::SyncMaxSearchResults,
            Self::SyncMinSearchLength,
            Self::LoggingLevel,
            Self::LoggingDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DatabaseDirectory => "database.directory",
            Self::DatabaseLanguage => "database.language",
            Self::DisplayCoordinateFormat => "display.coordinate_format",
            Self::DisplayDateFormat => "display.date_format",
            Self::DisplayDistanceUnit => "display.distance_unit",
            Self::SyncMaxResultCount => "sync.max_result_count",
            Self::SyncReviewPageSize => "sync.review_page_size",
            Self::SyncMaxSearchResults => "sync.max_search_results",
            Self::SyncMinSearchLength => "sync.min_search_length",
            Self::LoggingLevel => "logging.level",
            Self::LoggingDirectory => "logging.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.split().0
    }

    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or((name, ""))
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::DatabaseDirectory => path_text(&config.database.directory),
            Self::DatabaseLanguage => config.database.language.clone(),
            Self::DisplayCoordinateFormat => config.display.coordinate_format.to_string(),
            Self::DisplayDateFormat => config.display.date_format.to_string(),
            Self::DisplayDistanceUnit => config.display.distance_unit.to_string(),
            Self::SyncMaxResultCount => config.sync.max_result_count.to_string(),
            Self::SyncReviewPageSize => config.sync.review_page_size.to_string(),
            Self::SyncMaxSearchResults => config.sync.max_search_results.to_string(),
            Self::SyncMinSearchLength => config.sync.min_search_length.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingDirectory => path_text(&config.logging.directory),
        }
    }

    /// Validate and store a value. An empty value clears optional paths.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> AcdbResult<()> {
        let value = value.trim();
        match self {
            Self::DatabaseDirectory => config.database.directory = optional_path(value),
            Self::DatabaseLanguage => config.database.language = parse_language(value)?,
            Self::DisplayCoordinateFormat => config.display.coordinate_format = value.parse()?,
            Self::DisplayDateFormat => config.display.date_format = value.parse()?,
            Self::DisplayDistanceUnit => config.display.distance_unit = value.parse()?,
            Self::SyncMaxResultCount => config.sync.max_result_count = self.positive(value)?,
            Self::SyncReviewPageSize => config.sync.review_page_size = self.positive(value)?,
            Self::SyncMaxSearchResults => config.sync.max_search_results = self.positive(value)?,
            Self::SyncMinSearchLength => config.sync.min_search_length = self.number(value)?,
            Self::LoggingLevel => {
                if value.is_empty() {
                    return Err(AcdbError::Config("logging.level cannot be empty".to_string()));
                }
                config.logging.level = value.to_string();
            }
            Self::LoggingDirectory => config.logging.directory = optional_path(value),
        }
        Ok(())
    }

    fn number<T: FromStr>(&self, value: &str) -> AcdbResult<T> {
        value.parse().map_err(|_| {
            AcdbError::Config(format!("{} must be a number, got '{}'", self.name(), value))
        })
    }

    fn positive<T: FromStr + Default + PartialEq>(&self, value: &str) -> AcdbResult<T> {
        let parsed: T = self.number(value)?;
        if parsed == T::default() {
            return Err(AcdbError::Config(format!(
                "{} must be greater than zero",
                self.name()
            )));
        }
        Ok(parsed)
    }
}

impl FromStr for ConfigKey {
    type Err = AcdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| AcdbError::Config(format!("unknown configuration key '{}'", s)))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn path_text(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn language_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2}_[A-Z]{2}$")
            .unwrap_or_else(|e| panic!("language pattern failed to compile: {}", e))
    })
}

/// Validate an `xx_YY` language code such as `en_US` or `pt_BR`.
pub fn parse_language(value: &str) -> AcdbResult<String> {
    if language_pattern().is_match(value) {
        Ok(value.to_string())
    } else {
        Err(AcdbError::Config(format!(
            "invalid language '{}' (expected a code like en_US)",
            value
        )))
    }
}
