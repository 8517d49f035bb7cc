//! Top-level error type for the command-line surface.

use thiserror::Error;

use crate::config::ConfigError;
use crate::wallpaper::{CacheError, EngineError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),
    /// The wallpaper engine failed.
    #[error("Wallpaper error: {0}")]
    Engine(#[from] EngineError),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
    /// Generic command error.
    #[error("{0}")]
    CommandError(String),
}

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err.to_string()) }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self { Self::CommandError(err.to_string()) }
}

impl From<ConfigError> for StrataError {
    fn from(err: ConfigError) -> Self { Self::ConfigError(err.to_string()) }
}

impl From<CacheError> for StrataError {
    fn from(err: CacheError) -> Self { Self::CacheError(err.to_string()) }
}

impl From<String> for StrataError {
    fn from(msg: String) -> Self { Self::CommandError(msg) }
}

impl From<&str> for StrataError {
    fn from(msg: &str) -> Self { Self::CommandError(msg.to_string()) }
}
