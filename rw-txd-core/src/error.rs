//! Error types shared by the RenderWare core types

use std::io;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by version parsing, configuration and diagnostics
#[derive(Error, Debug)]
pub enum CoreError {
    /// IO errors when reading configuration files
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed library version string or stamp
    #[error("Version error: {message}")]
    Version { message: String },

    /// Invalid engine configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Create a version error
    pub fn version<S: Into<String>>(message: S) -> Self {
        Self::Version {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
