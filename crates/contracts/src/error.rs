//! Layered error definitions
//!
//! Categorized by source: config / transport / catalog

use thiserror::Error;

/// Unified error type for configuration and catalog failures
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Catalog Errors =====
    /// Port enumeration failed
    #[error("port enumeration failed: {message}")]
    Enumeration { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create port enumeration error
    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::Enumeration {
            message: message.into(),
        }
    }
}

/// Byte-stream endpoint errors
///
/// `EndOfStream` is kept apart from every other read failure: it ends a
/// session normally, while `Read` is fatal to the loop that owns the port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Open failed; the candidate is excluded for the current round
    #[error("failed to open '{port}': {message}")]
    Open { port: String, message: String },

    /// Non end-of-stream read failure
    #[error("read error on '{port}': {message}")]
    Read { port: String, message: String },

    /// Write failure, returned to the writer without retry
    #[error("write error on '{port}': {message}")]
    Write { port: String, message: String },

    /// Close failure
    #[error("close error on '{port}': {message}")]
    Close { port: String, message: String },

    /// Transport was already closed
    #[error("transport '{port}' is closed")]
    Closed { port: String },

    /// Designated end-of-stream condition
    #[error("end of stream")]
    EndOfStream,
}

impl TransportError {
    /// Create open error
    pub fn open(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Open {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create read error
    pub fn read(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create write error
    pub fn write(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create close error
    pub fn close(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Close {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create closed error
    pub fn closed(port: impl Into<String>) -> Self {
        Self::Closed { port: port.into() }
    }

    /// Whether this is the end-of-stream condition
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}
