//! Bootstrap configuration loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `EVSOUND_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/evsound/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not an error: a warning is logged and defaults
//! are used. A config file that exists but does not parse is an error.

use crate::codes::ErrorCode;
use crate::props::{PropValue, PropertyBag};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "EVSOUND_CONFIG";

/// Environment variable overriding `driver.kind`
pub const ENV_DRIVER: &str = "EVSOUND_DRIVER";

/// Default playback length for the simulated driver
pub const DEFAULT_DURATION_MS: u64 = 1000;

/// Which backend driver to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Completes every request immediately
    Null,
    /// Worker-thread driver with timed completions
    #[default]
    Simulated,
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(DriverKind::Null),
            "simulated" => Ok(DriverKind::Simulated),
            other => Err(Error::Config(format!("Unknown driver kind '{}'", other))),
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverKind::Null => write!(f, "null"),
            DriverKind::Simulated => write!(f, "simulated"),
        }
    }
}

/// `[driver]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub kind: DriverKind,

    /// Playback length for events with no entry in `durations`
    pub default_duration_ms: u64,

    /// Whether `cache` is accepted
    pub cache_supported: bool,

    /// Per `event.id` playback length
    pub durations: BTreeMap<String, u64>,

    /// Per `event.id` forced failure code
    pub failures: BTreeMap<String, ErrorCode>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::default(),
            default_duration_ms: DEFAULT_DURATION_MS,
            cache_supported: false,
            durations: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }
}

/// `[logging]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub driver: DriverConfig,

    /// Application-level properties; keys are the suffix after
    /// `application.` (e.g. `name`, `id`, `icon_name`)
    pub application: BTreeMap<String, PropValue>,

    pub logging: LoggingConfig,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Application table as a property bag with `application.` prefixed keys
    pub fn application_props(&self) -> Result<PropertyBag> {
        PropertyBag::from_pairs(
            self.application
                .iter()
                .map(|(k, v)| (format!("application.{}", k), v.clone())),
        )
    }

    /// Apply `EVSOUND_DRIVER` if set
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var(ENV_DRIVER) {
            self.driver.kind = kind.parse()?;
            debug!("Driver kind overridden by {}: {}", ENV_DRIVER, self.driver.kind);
        }
        Ok(())
    }
}

/// Resolves and loads the config file following the priority order
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Path of the config file to read, if any candidate applies
    pub fn resolve_path(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config directory
        dirs::config_dir()
            .map(|d| d.join("evsound").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// Environment overrides are applied on top of whatever was loaded.
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match self.resolve_path() {
            Some(path) if path.exists() => {
                info!("Using config file {}", path.display());
                TomlConfig::from_file(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                debug!("No config file, using compiled defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }
}
