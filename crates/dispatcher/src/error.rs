//! Dispatcher error types

use contracts::TransportError;
use thiserror::Error;

/// Dispatcher construction errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Parallelism outside `1..=MAX_PARALLELISM`
    #[error("parallelism must be between 1 and {max}, got {0}", max = contracts::MAX_PARALLELISM)]
    InvalidParallelism(usize),

    /// Forward failure mode selected without a failure channel
    #[error("failure mode 'forward' requires a failure sink")]
    MissingFailureSink,
}

/// Failure reported by a message handler
///
/// Isolated to the one message; never stops the dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler-defined failure
    #[error("{0}")]
    Failed(String),

    /// Reply write failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HandlerError {
    /// Create a handler-defined failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
