//! Session orchestration module.

mod session;
mod stats;

pub use session::BroadcastSession;
pub use stats::{SessionEnd, SessionReport};
