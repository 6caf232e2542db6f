//! Error types for ECP

use thiserror::Error;

/// Result type alias for ECP operations
pub type Result<T> = std::result::Result<T, EcpError>;

/// Errors shared across ECP components
#[derive(Error, Debug)]
pub enum EcpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
