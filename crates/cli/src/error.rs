//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Mirror connection did not start with a usable header line
    #[error("Invalid stream header from {peer}: '{header}'")]
    InvalidHeader { peer: String, header: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_header(peer: impl Into<String>, header: impl Into<String>) -> Self {
        Self::InvalidHeader {
            peer: peer.into(),
            header: header.into(),
        }
    }
}
