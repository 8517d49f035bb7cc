//! Configuration module for Strata.
//!
//! This module provides the configuration types, loading, and file watching
//! for hot-reloading configuration changes.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

pub mod template;
pub mod types;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use types::{
    ConfigError, StrataConfig, config_paths, load_config as load_config_default, load_config_from_path,
    parse_config, parse_hex_color,
};
pub use watcher::ConfigWatcher;

/// Custom config path override (set via CLI --config flag).
static CUSTOM_CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets a custom configuration file path to use instead of the default search paths.
///
/// This must be called before [`load`] to take effect.
///
/// # Returns
///
/// `true` if the path was set successfully, `false` if a path was already set.
pub fn set_custom_config_path(path: PathBuf) -> bool { CUSTOM_CONFIG_PATH.set(path).is_ok() }

/// A configuration together with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: StrataConfig,
    /// `None` when running on defaults.
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Directory that relative paths in the configuration resolve against:
    /// the config file's directory, or the working directory.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }
}

/// Loads the configuration from disk.
///
/// Uses the `--config` override when set, otherwise the first file found in
/// [`config_paths`]. If no file exists anywhere, a template is written to the
/// preferred location and defaults are returned.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// `--config` file does not exist.
pub fn load() -> Result<LoadedConfig, ConfigError> {
    let result = CUSTOM_CONFIG_PATH.get().map_or_else(load_config_default, |path| load_config_from_path(path));

    match result {
        Ok((config, path)) => {
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(LoadedConfig { config, path: Some(path) })
        }
        Err(ConfigError::NotFound) if CUSTOM_CONFIG_PATH.get().is_none() => {
            let path = create_default_config_file();
            Ok(LoadedConfig {
                config: StrataConfig::default(),
                path,
            })
        }
        Err(err) => Err(err),
    }
}

/// Re-reads a configuration file and validates it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn reload(path: &Path) -> Result<StrataConfig, ConfigError> {
    let (config, _) = load_config_from_path(path)?;
    config.validate()?;
    Ok(config)
}

/// Creates a template configuration file at the preferred location.
///
/// Returns the path when the file was created.
fn create_default_config_file() -> Option<PathBuf> {
    let Some(config_path) = default_config_path() else {
        tracing::debug!("no config path available for creating template");
        return None;
    };

    if config_path.exists() {
        return None;
    }

    match template::create_config_file(&config_path) {
        Ok(()) => {
            tracing::info!(path = %config_path.display(), "created default configuration file");
            Some(config_path)
        }
        Err(err) => {
            tracing::debug!(
                error = %err,
                path = %config_path.display(),
                "failed to create default configuration file"
            );
            None
        }
    }
}

/// The preferred configuration file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> { config_paths().into_iter().next() }

/// Returns the `--config` override, if any.
pub fn get_custom_config_path() -> Option<&'static PathBuf> { CUSTOM_CONFIG_PATH.get() }
