//! # Contracts
//!
//! Frozen interface contracts shared by every stage of the serial broadcast pipeline.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - bytes -> `framing` -> ordered [`Frame`] sequence -> `dispatcher` -> handlers
//! - candidate ports -> `detector` races reads through a [`Verifier`] -> winning [`Transport`]

mod blueprint;
mod cancel;
mod error;
mod frame;
mod transport;
mod verifier;

pub use blueprint::*;
pub use cancel::CancellationToken;
pub use error::*;
pub use frame::{is_whitespace, split_prefix, Frame};
pub use transport::{DeviceCatalog, LocalTransport, Transport, TransportFactory};
pub use verifier::Verifier;
