//! # CLI Configuration
//!
//! Where the database lives and which currencies the ledger accepts.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Command-line flags (highest priority)                              │
//! │     --db ./caisse.db                                                   │
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     CAISSE_DB_PATH=/srv/caisse/caisse.db                               │
//! │     CAISSE_LOCK_TIMEOUT_MS=2000                                        │
//! │     CAISSE_CURRENCIES=USD,CDF                                          │
//! │                                                                         │
//! │  3. TOML Config File                                                   │
//! │     ~/.config/caisse/caisse.toml (Linux)                               │
//! │     ~/Library/Application Support/com.caisse.caisse/caisse.toml (macOS)│
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! │     built-in catalog, 5 s lock timeout, data-dir/caisse.db             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # caisse.toml
//! [database]
//! path = "/srv/caisse/caisse.db"
//! max_connections = 5
//! lock_timeout_ms = 5000
//!
//! [currencies]
//! allowed = ["USD", "CDF"]          # empty = the whole built-in catalog
//!
//! [[currencies.extra]]
//! code = "SSP"
//! exponent = 2
//!
//! [reports]
//! institution_separator = ":"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use caisse_core::{Currency, CurrencyCatalog};
use caisse_db::{DbConfig, DEFAULT_LOCK_TIMEOUT};

/// Config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "caisse.toml";

/// Database file name inside the platform data directory.
pub const DATABASE_FILE_NAME: &str = "caisse.db";

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Could not determine the platform data directory")]
    NoDataDirectory,
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Bound on lock waits, in-process and in SQLite.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// A currency added on top of the built-in catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCurrency {
    pub code: String,
    pub exponent: u32,
}

/// `[currencies]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// Allow-list. Empty keeps every catalogued currency.
    #[serde(default)]
    pub allowed: Vec<String>,

    #[serde(default)]
    pub extra: Vec<ExtraCurrency>,
}

/// `[reports]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Separator between institution and reference in `external_ref`.
    #[serde(default = "default_separator")]
    pub institution_separator: char,
}

fn default_separator() -> char {
    ':'
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            institution_separator: default_separator(),
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub currencies: CurrencySettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

impl AppConfig {
    /// Loads file, then environment.
    ///
    /// An explicitly given file must exist; the default location may be
    /// absent, in which case defaults apply.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    AppConfig::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Applies `CAISSE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CAISSE_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("CAISSE_LOCK_TIMEOUT_MS") {
            self.database.lock_timeout_ms = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("CAISSE_LOCK_TIMEOUT_MS", "expected milliseconds"))?;
        }
        if let Some(value) = lookup("CAISSE_MAX_CONNECTIONS") {
            self.database.max_connections = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("CAISSE_MAX_CONNECTIONS", "expected a count"))?;
        }
        if let Some(value) = lookup("CAISSE_CURRENCIES") {
            self.currencies.allowed = value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Builds the currency catalog: built-ins, plus extras, cut to the allow-list.
    pub fn catalog(&self) -> Result<CurrencyCatalog, ConfigError> {
        let mut catalog = CurrencyCatalog::default();
        for extra in &self.currencies.extra {
            let currency = Currency::parse(&extra.code)
                .map_err(|e| ConfigError::invalid("currencies.extra", e.to_string()))?;
            catalog = catalog
                .with_currency(currency, extra.exponent)
                .map_err(|e| ConfigError::invalid("currencies.extra", e.to_string()))?;
        }

        if self.currencies.allowed.is_empty() {
            return Ok(catalog);
        }

        let allowed = self
            .currencies
            .allowed
            .iter()
            .map(|code| catalog.resolve(code))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::invalid("currencies.allowed", e.to_string()))?;
        Ok(catalog.restrict_to(&allowed))
    }

    /// Database file, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = project_dirs().ok_or(ConfigError::NoDataDirectory)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|source| ConfigError::Read {
            path: data_dir.to_path_buf(),
            source,
        })?;
        Ok(data_dir.join(DATABASE_FILE_NAME))
    }

    /// Storage configuration for `Database::new`.
    pub fn db_config(&self) -> Result<DbConfig, ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be at least 1",
            ));
        }

        Ok(DbConfig::new(self.database_path()?)
            .max_connections(self.database.max_connections)
            .lock_timeout(Duration::from_millis(self.database.lock_timeout_ms))
            .catalog(self.catalog()?))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "caisse", "caisse")
}

/// Platform location of `caisse.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.lock_timeout_ms, 5_000);
        assert_eq!(config.reports.institution_separator, ':');
        assert_eq!(config.catalog().unwrap(), CurrencyCatalog::default());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
            [database]
            path = "/tmp/shop.db"
            lock_timeout_ms = 750

            [currencies]
            allowed = ["USD", "cdf", "SSP"]

            [[currencies.extra]]
            code = "SSP"
            exponent = 2

            [reports]
            institution_separator = "/"
            "#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/shop.db")));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.reports.institution_separator, '/');

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.resolve("SSP").is_ok());
        assert!(catalog.resolve("EUR").is_err());

        let db = config.db_config().unwrap();
        assert_eq!(db.lock_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CAISSE_DB_PATH", "/srv/caisse.db"),
            ("CAISSE_LOCK_TIMEOUT_MS", "1200"),
            ("CAISSE_CURRENCIES", "USD, CDF"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path, Some(PathBuf::from("/srv/caisse.db")));
        assert_eq!(config.database.lock_timeout_ms, 1_200);
        assert_eq!(config.currencies.allowed, vec!["USD", "CDF"]);
        assert_eq!(config.catalog().unwrap().len(), 2);
    }

    #[test]
    fn test_bad_values_are_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "CAISSE_LOCK_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        config.currencies.allowed = vec!["XYZ".into()];
        assert!(config.catalog().is_err());

        let missing = AppConfig::load(Some(Path::new("/nonexistent/caisse.toml")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
