//! Failure delivery - where handler failures and unroutable messages go

use contracts::FailureMode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::HandlerError;

/// What went wrong with one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailureKind {
    /// The resolved handler reported a failure
    HandlerFailed { prefix: String, error: HandlerError },
    /// No keyed handler matched and no default is set
    Unroutable { prefix: String },
}

/// A failed or unroutable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    /// Frame sequence number
    pub seq: u64,
    /// Decoded message
    pub message: String,
    pub kind: DispatchFailureKind,
}

/// Active failure-delivery mode; exactly one per dispatcher
#[derive(Debug, Clone)]
pub enum FailureDelivery {
    /// Discard silently
    Drop,
    /// Write a warning through tracing
    Log,
    /// Send to a failure channel
    Forward(mpsc::Sender<DispatchFailure>),
}

impl FailureDelivery {
    /// Mode name, as in configuration
    pub fn mode(&self) -> FailureMode {
        match self {
            Self::Drop => FailureMode::Drop,
            Self::Log => FailureMode::Log,
            Self::Forward(_) => FailureMode::Forward,
        }
    }

    /// Deliver one failure according to the active mode
    pub async fn deliver(&self, failure: DispatchFailure) {
        match self {
            Self::Drop => {}
            Self::Log => match &failure.kind {
                DispatchFailureKind::HandlerFailed { prefix, error } => {
                    warn!(seq = failure.seq, prefix = %prefix, error = %error, "handler failed");
                }
                DispatchFailureKind::Unroutable { prefix } => {
                    warn!(seq = failure.seq, prefix = %prefix, "unroutable message");
                }
            },
            Self::Forward(tx) => {
                let seq = failure.seq;
                if tx.send(failure).await.is_err() {
                    debug!(seq, "failure sink closed, failure discarded");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unroutable(seq: u64) -> DispatchFailure {
        DispatchFailure {
            seq,
            message: "NOPE 1".to_string(),
            kind: DispatchFailureKind::Unroutable {
                prefix: "NOPE".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_forward_sends_failure() {
        let (tx, mut rx) = mpsc::channel(4);
        let delivery = FailureDelivery::Forward(tx);
        delivery.deliver(unroutable(7)).await;

        assert_eq!(rx.recv().await.unwrap(), unroutable(7));
        assert_eq!(delivery.mode(), FailureMode::Forward);
    }

    #[tokio::test]
    async fn test_forward_to_closed_sink_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        FailureDelivery::Forward(tx).deliver(unroutable(1)).await;
    }

    #[tokio::test]
    async fn test_drop_and_log_are_silent_to_caller() {
        FailureDelivery::Drop.deliver(unroutable(1)).await;
        FailureDelivery::Log.deliver(unroutable(2)).await;
    }
}
