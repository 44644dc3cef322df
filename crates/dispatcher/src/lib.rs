//! # Dispatcher
//!
//! Message routing and bounded-concurrency handler execution.
//!
//! Responsibilities:
//! - Consume `Frame`s in arrival order
//! - Resolve a handler by exact prefix match, falling back to a default
//! - Run at most `parallelism` handlers at once; a full pool stalls intake
//! - Deliver handler failures and unroutable messages (drop / log / forward)

pub mod dispatcher;
pub mod error;
pub mod failure;
pub mod metrics;
pub mod registry;

pub use contracts::{FailureMode, Frame};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::{DispatcherError, HandlerError};
pub use failure::{DispatchFailure, DispatchFailureKind, FailureDelivery};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use registry::{
    handler_fn, HandlerFuture, HandlerRegistry, HandlerRegistryBuilder, MessageHandler,
    RegistryHandle,
};
