//! Configuration file discovery and TOML loading
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`<config_dir>/avsync/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing or unreadable config file never aborts startup: callers get the
//! built-in defaults and a warning in the log.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the config file path
pub const CONFIG_ENV_VAR: &str = "AVSYNC_CONFIG";

/// File name looked up inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where the resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given on the command line
    CommandLine(PathBuf),
    /// Path taken from the environment variable
    Environment(PathBuf),
    /// File found in the user config directory
    UserConfigDir(PathBuf),
    /// No file; built-in defaults apply
    Defaults,
}

impl ConfigSource {
    /// Path of the config file, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserConfigDir(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// Resolve which config file to use.
///
/// Explicit paths (command line, environment) are returned even when the file
/// does not exist, so the loader can warn about it; the user config directory
/// is only used when the file is present.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            return ConfigSource::UserConfigDir(path);
        }
    }

    // Priority 4: Built-in defaults
    ConfigSource::Defaults
}

/// Default per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("avsync").join(CONFIG_FILE_NAME))
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load `T` from a TOML file, failing on missing file or parse error
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_toml(&content)
}

/// Load `T` from the resolved source with graceful degradation.
///
/// - `Defaults` → `T::default()`
/// - missing file → warning + `T::default()`
/// - malformed file → error (a config the user wrote but we cannot read is
///   not silently ignored)
pub fn load_or_default<T: DeserializeOwned + Default>(source: &ConfigSource) -> Result<T> {
    let Some(path) = source.path() else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} does not exist, using built-in defaults",
            path.display()
        );
        return Ok(T::default());
    }

    info!("Loading configuration from {}", path.display());
    load_toml_file(path)
}
