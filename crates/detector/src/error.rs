//! Detector error types

use thiserror::Error;

/// Auto-detection errors
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Verifier pattern does not compile; raised before any probing starts
    #[error("invalid verification pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Probing was cancelled before a device matched
    #[error("device detection cancelled")]
    Cancelled,

    /// The configured round limit was reached without a match
    #[error("no device matched after {rounds} rounds")]
    Exhausted { rounds: u64 },
}

impl DetectorError {
    /// Create invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, DetectorError>;
