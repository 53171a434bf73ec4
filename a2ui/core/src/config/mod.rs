//! TOML Configuration File Support
//!
//! Centralized configuration loading for the widget core, supporting a TOML
//! configuration file at `~/.config/a2ui/core.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [attention]
//! max_visible_total = 3
//! max_visible_high_priority = 1
//! max_visible_medium_priority = 2
//! cooldown_ms = 5000
//! max_queue_size = 20
//! max_retired_ids = 1000
//! default_ttl_secs = 300
//! focus_allowlist = ["rest-timer", "timer-widget"]
//!
//! [interpreter]
//! default_agent = "GENESIS"
//!
//! [storage]
//! directory = "/var/lib/a2ui"
//! surface_key = "surface-store"
//! persist = true
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attention::AttentionBudgetConfig;
use crate::chat::DEFAULT_AGENT;
use crate::surface::DEFAULT_SURFACE_KEY;

/// Environment variable names read by [`load_config`]
pub mod env {
    /// `max_visible_total`
    pub const MAX_VISIBLE: &str = "A2UI_MAX_VISIBLE";
    /// `max_visible_high_priority`
    pub const MAX_VISIBLE_HIGH: &str = "A2UI_MAX_VISIBLE_HIGH";
    /// `cooldown_ms`
    pub const COOLDOWN_MS: &str = "A2UI_COOLDOWN_MS";
    /// `max_queue_size`
    pub const MAX_QUEUE_SIZE: &str = "A2UI_MAX_QUEUE_SIZE";
    /// Interpreter default agent label
    pub const DEFAULT_AGENT: &str = "A2UI_DEFAULT_AGENT";
    /// Snapshot directory
    pub const STORAGE_DIR: &str = "A2UI_STORAGE_DIR";
    /// Enable write-through persistence
    pub const PERSIST: &str = "A2UI_PERSIST";

    /// Every variable, for test cleanup
    pub const ALL: [&str; 7] = [
        MAX_VISIBLE,
        MAX_VISIBLE_HIGH,
        COOLDOWN_MS,
        MAX_QUEUE_SIZE,
        DEFAULT_AGENT,
        STORAGE_DIR,
        PERSIST,
    ];
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[attention]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionToml {
    /// Ceiling on visible widgets
    pub max_visible_total: Option<usize>,

    /// Ceiling on visible `high` widgets
    pub max_visible_high_priority: Option<usize>,

    /// Ceiling on visible `medium` widgets (unset = no ceiling)
    pub max_visible_medium_priority: Option<usize>,

    /// Minimum gap between admissions in milliseconds
    pub cooldown_ms: Option<u64>,

    /// Ceiling on waiting widgets
    pub max_queue_size: Option<usize>,

    /// Finished widget ids remembered to refuse re-admission
    pub max_retired_ids: Option<usize>,

    /// Queue TTL fallback in seconds
    pub default_ttl_secs: Option<u64>,

    /// Widget types admitted during a workout (replaces the catalog default)
    pub focus_allowlist: Option<Vec<String>>,
}

/// `[interpreter]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterToml {
    /// Agent label for responses that name none
    pub default_agent: Option<String>,
}

/// `[storage]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Directory for surface snapshots
    pub directory: Option<PathBuf>,

    /// Item name the snapshot is stored under
    pub surface_key: Option<String>,

    /// Whether to write snapshots through on every mutation
    pub persist: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreToml {
    /// Attention budget section
    pub attention: AttentionToml,

    /// Interpreter section
    pub interpreter: InterpreterToml,

    /// Storage section
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration for a widget session
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Attention budget
    pub attention: AttentionBudgetConfig,

    /// Interpreter default agent label
    pub default_agent: String,

    /// Snapshot directory (`None` = platform data dir)
    pub storage_dir: Option<PathBuf>,

    /// Snapshot item name
    pub surface_key: String,

    /// Whether surfaces are persisted
    pub persist: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            attention: AttentionBudgetConfig::default(),
            default_agent: DEFAULT_AGENT.to_string(),
            storage_dir: None,
            surface_key: DEFAULT_SURFACE_KEY.to_string(),
            persist: false,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let attention = &self.attention;
        if attention.max_visible_total == 0 {
            return Err(ConfigError::ValidationError(
                "max_visible_total must be at least 1".to_string(),
            ));
        }
        if attention.max_visible_high_priority > attention.max_visible_total {
            return Err(ConfigError::ValidationError(format!(
                "max_visible_high_priority ({}) exceeds max_visible_total ({})",
                attention.max_visible_high_priority, attention.max_visible_total
            )));
        }
        if let Some(medium) = attention.max_visible_medium_priority {
            if medium > attention.max_visible_total {
                return Err(ConfigError::ValidationError(format!(
                    "max_visible_medium_priority ({medium}) exceeds max_visible_total ({})",
                    attention.max_visible_total
                )));
            }
        }
        if attention.max_queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_queue_size must be at least 1".to_string(),
            ));
        }
        if self.surface_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "surface_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/a2ui/core.toml` or `~/.config/a2ui/core.toml`
/// if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("a2ui").join("core.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the merged values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<CoreConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the merged values fail validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<CoreConfig, ConfigError> {
    let mut config = CoreConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: CoreToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut CoreConfig, toml: &CoreToml) {
    let attention = &mut config.attention;
    if let Some(total) = toml.attention.max_visible_total {
        attention.max_visible_total = total;
    }
    if let Some(high) = toml.attention.max_visible_high_priority {
        attention.max_visible_high_priority = high;
    }
    if let Some(medium) = toml.attention.max_visible_medium_priority {
        attention.max_visible_medium_priority = Some(medium);
    }
    if let Some(cooldown) = toml.attention.cooldown_ms {
        attention.cooldown_ms = cooldown;
    }
    if let Some(size) = toml.attention.max_queue_size {
        attention.max_queue_size = size;
    }
    if let Some(retired) = toml.attention.max_retired_ids {
        attention.max_retired_ids = retired;
    }
    if let Some(ttl) = toml.attention.default_ttl_secs {
        attention.default_ttl_ms = ttl.saturating_mul(1_000);
    }
    if let Some(ref allowlist) = toml.attention.focus_allowlist {
        attention.focus_allowlist = allowlist.iter().cloned().collect();
    }

    if let Some(ref agent) = toml.interpreter.default_agent {
        config.default_agent = agent.clone();
    }

    if toml.storage.directory.is_some() {
        config.storage_dir = toml.storage.directory.clone();
    }
    if let Some(ref key) = toml.storage.surface_key {
        config.surface_key = key.clone();
    }
    if let Some(persist) = toml.storage.persist {
        config.persist = persist;
    }
}

/// Apply environment overrides, reading variables through `lookup`
///
/// Unparseable numeric values are ignored with a warning.
fn apply_env_config<F>(config: &mut CoreConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
        let parsed = value.trim().parse::<T>().ok();
        if parsed.is_none() {
            tracing::warn!(variable = key, value = value, "Ignoring unparseable environment value");
        }
        parsed
    }

    if let Some(n) = lookup(env::MAX_VISIBLE).and_then(|v| parsed::<usize>(env::MAX_VISIBLE, &v)) {
        config.attention.max_visible_total = n;
        config.source = ConfigSource::Env;
    }
    if let Some(n) = lookup(env::MAX_VISIBLE_HIGH).and_then(|v| parsed::<usize>(env::MAX_VISIBLE_HIGH, &v)) {
        config.attention.max_visible_high_priority = n;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup(env::COOLDOWN_MS).and_then(|v| parsed::<u64>(env::COOLDOWN_MS, &v)) {
        config.attention.cooldown_ms = ms;
        config.source = ConfigSource::Env;
    }
    if let Some(n) = lookup(env::MAX_QUEUE_SIZE).and_then(|v| parsed::<usize>(env::MAX_QUEUE_SIZE, &v)) {
        config.attention.max_queue_size = n;
        config.source = ConfigSource::Env;
    }
    if let Some(agent) = lookup(env::DEFAULT_AGENT).filter(|a| !a.is_empty()) {
        config.default_agent = agent;
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = lookup(env::STORAGE_DIR).filter(|d| !d.is_empty()) {
        config.storage_dir = Some(PathBuf::from(dir));
        config.source = ConfigSource::Env;
    }
    if let Some(persist) = lookup(env::PERSIST) {
        config.persist = persist != "0" && persist.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides,
/// then call [`CoreConfig::validate`] again.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Visible ceiling override
    pub max_visible_total: Option<usize>,

    /// Cooldown override (milliseconds)
    pub cooldown_ms: Option<u64>,

    /// Default agent override
    pub default_agent: Option<String>,

    /// Snapshot directory override
    pub storage_dir: Option<PathBuf>,

    /// Persistence override
    pub persist: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set visible ceiling override
    #[must_use]
    pub fn with_max_visible_total(mut self, total: usize) -> Self {
        self.max_visible_total = Some(total);
        self
    }

    /// Set cooldown override
    #[must_use]
    pub fn with_cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_ms = Some(ms);
        self
    }

    /// Set default agent override
    #[must_use]
    pub fn with_default_agent(mut self, agent: String) -> Self {
        self.default_agent = Some(agent);
        self
    }

    /// Set snapshot directory override
    #[must_use]
    pub fn with_storage_dir(mut self, dir: PathBuf) -> Self {
        self.storage_dir = Some(dir);
        self
    }

    /// Set persistence override
    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut CoreConfig) {
        if self.max_visible_total.is_some()
            || self.cooldown_ms.is_some()
            || self.default_agent.is_some()
            || self.storage_dir.is_some()
            || self.persist.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(total) = self.max_visible_total {
            config.attention.max_visible_total = total;
        }
        if let Some(ms) = self.cooldown_ms {
            config.attention.cooldown_ms = ms;
        }
        if let Some(ref agent) = self.default_agent {
            config.default_agent = agent.clone();
        }
        if let Some(ref dir) = self.storage_dir {
            config.storage_dir = Some(dir.clone());
        }
        if let Some(persist) = self.persist {
            config.persist = persist;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
