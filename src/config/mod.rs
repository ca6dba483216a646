//! Configuration management.
//!
//! Settings come from a TOML file merged over defaults, then environment
//! variables (optionally loaded from `.env`):
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CONTACT_GATE_DATABASE_PATH` | `database_path` |
//! | `CONTACT_GATE_PHONE_COUNTRY_CODE` | `phone_country_code` |
//! | `CONTACT_GATE_EXCLUSIVE_MATCHING` | `exclusive_matching` |
//! | `CONTACT_GATE_LOG_LEVEL` | `logging.level` |
//! | `CONTACT_GATE_LOG_FORMAT` | `logging.format` |

use crate::models::MatchingFlags;
use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application directory name under the platform config and data dirs.
const APP_DIR: &str = "contact-gate";

/// Environment variable prefix.
const ENV_PREFIX: &str = "CONTACT_GATE_";

/// Main configuration for the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Path to the `SQLite` cache database.
    pub database_path: PathBuf,
    /// Country code applied to national phone numbers.
    pub phone_country_code: String,
    /// Matching types checked for exclusivity.
    pub exclusive_matching: MatchingFlags,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Phone country code.
    pub phone_country_code: Option<String>,
    /// Exclusivity matching mask.
    pub exclusive_matching: Option<u32>,
    /// Logging section.
    pub logging: Option<LoggingConfig>,
}

fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("contact-gate.db"),
        |dirs| dirs.data_local_dir().join(APP_DIR).join("cache.db"),
    )
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            phone_country_code: "1".to_string(),
            exclusive_matching: MatchingFlags::EXCLUSIVE_DEFAULT,
            logging: LoggingConfig::default(),
        }
    }
}

/// Validates an exclusivity mask: non-empty and within the known matching bits.
fn validate_matching(bits: u32) -> Result<MatchingFlags> {
    let known = MatchingFlags::ALL.iter().fold(0, |acc, flag| acc | flag.bits());
    if bits == 0 || bits & !known != 0 {
        return Err(Error::InvalidInput(format!(
            "exclusive_matching must be a non-empty mask of {known:#b}, got {bits}"
        )));
    }
    Ok(MatchingFlags::from_bits(bits))
}

impl GateConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// invalid value.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/contact-gate/` on macOS)
    /// 2. XDG config dir (`~/.config/contact-gate/` for Unix compatibility)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join(APP_DIR).join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join(APP_DIR)
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Applies `CONTACT_GATE_*` environment overrides, loading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an invalid value.
    pub fn with_env_overrides(self) -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by full variable name.
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an invalid value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = var("DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(code) = var("PHONE_COUNTRY_CODE") {
            self.phone_country_code = code;
        }
        if let Some(raw) = var("EXCLUSIVE_MATCHING") {
            let bits = raw.parse::<u32>().map_err(|e| {
                Error::InvalidInput(format!("{ENV_PREFIX}EXCLUSIVE_MATCHING '{raw}': {e}"))
            })?;
            self.exclusive_matching = validate_matching(bits)?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format.parse::<LogFormat>()?;
        }

        Ok(self)
    }

    /// Converts a `ConfigFile` to `GateConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(code) = file.phone_country_code {
            config.phone_country_code = code;
        }
        if let Some(bits) = file.exclusive_matching {
            config.exclusive_matching = validate_matching(bits)?;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        Ok(config)
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the phone country code.
    #[must_use]
    pub fn with_phone_country_code(mut self, code: impl Into<String>) -> Self {
        self.phone_country_code = code.into();
        self
    }
}
