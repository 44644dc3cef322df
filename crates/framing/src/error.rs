//! Framing error types

use contracts::TransportError;
use thiserror::Error;

/// Framing errors
#[derive(Debug, Error)]
pub enum FramingError {
    /// Non end-of-stream transport failure; ends the session
    #[error("transport failure on '{port}': {source}")]
    Transport {
        /// Transport ID
        port: String,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// The frame consumer went away
    #[error("frame channel closed for '{port}'")]
    ChannelClosed {
        /// Transport ID
        port: String,
    },
}

/// Framing Result alias
pub type Result<T> = std::result::Result<T, FramingError>;
