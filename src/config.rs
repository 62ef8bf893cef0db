//! Layered configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `DUPECAT_` environment variables, with `__` separating sections
//!    (`DUPECAT_SCAN__MAX_DEPTH=8`, `DUPECAT_HASHING__SAMPLE_COUNT=16`)
//! 4. Command line overrides ([`ConfigOverrides`])
//!
//! # Example
//!
//! ```toml
//! database = "/var/lib/dupecat/catalog.db"
//!
//! [scan]
//! follow_symlinks = false
//! max_depth = 64
//! exclude_patterns = ["node_modules", "*.tmp"]
//!
//! [hashing]
//! full_max_size = 1048576
//! sample_count = 10
//!
//! [migration]
//! batch_size = 1000
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hierarchy::MigrationSettings;
use crate::scanner::{HashPolicy, ScanOptions};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DUPECAT_";

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog database file.
    pub database: PathBuf,
    /// Traversal options.
    pub scan: ScanOptions,
    /// Fingerprint tiers.
    pub hashing: HashPolicy,
    /// Migration batch bounds.
    pub migration: MigrationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Self::default_database_path(),
            scan: ScanOptions::default(),
            hashing: HashPolicy::default(),
            migration: MigrationSettings::default(),
        }
    }
}

/// Values supplied on the command line. `None` leaves lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    pub scan: ScanOverrides,
}

/// Command line overrides for [`ScanOptions`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
}

impl Config {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "dupecat", "dupecat")
    }

    /// Platform data directory location of the catalog, or `dupecat.db`
    /// in the working directory if no home directory is known.
    #[must_use]
    pub fn default_database_path() -> PathBuf {
        Self::project_dirs().map_or_else(
            || PathBuf::from("dupecat.db"),
            |dirs| dirs.data_dir().join("catalog.db"),
        )
    }

    /// Platform config directory location of `config.toml`.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, then the TOML file, then environment variables.
    ///
    /// A missing default config file is not an error.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = config_file
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path)
        {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathNotFound`] if an explicit config file does not
    /// exist, [`Error::ConfigLoad`] if a layer cannot be parsed, or
    /// [`Error::Config`] if the merged values are unusable.
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(Error::PathNotFound(path.to_path_buf()));
            }
        }

        let config: Config = Self::figment(config_file)
            .merge(Serialized::defaults(overrides))
            .extract()?;
        config.validate()?;
        log::debug!("Loaded configuration: database {}", config.database.display());
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.database.as_os_str().is_empty() {
            return Err(Error::Config("database path is empty".to_string()));
        }
        if self.scan.insert_batch_size == 0 {
            return Err(Error::Config(
                "scan.insert_batch_size must be at least 1".to_string(),
            ));
        }
        self.hashing.validate().map_err(Error::Config)?;
        self.migration.validate().map_err(Error::Config)?;
        Ok(())
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
