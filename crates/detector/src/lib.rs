//! # Detector
//!
//! Finds which candidate port is attached to the target device.
//!
//! Responsibilities:
//! - Verify incoming chunks against a pattern (`MaskVerifier`)
//! - Race one read loop per candidate; first match wins, the rest are closed
//! - Re-enumerate and retry after a backoff until a match or cancellation
//! - Serial backend: transport, factory and port catalog
//!
//! ## Usage Example
//!
//! ```ignore
//! use detector::{AutoDetectConfig, AutoDetector, MaskVerifier, SerialCatalog, SerialFactory};
//!
//! let verifier = Arc::new(MaskVerifier::from_config(&blueprint.detection)?);
//! let detector = AutoDetector::new(
//!     SerialCatalog,
//!     SerialFactory::new(blueprint.serial.clone()),
//!     verifier,
//!     AutoDetectConfig::from_blueprint(&blueprint),
//! );
//! let device = detector.detect(&cancel).await?;
//! ```

pub mod auto_detect;
pub mod error;
pub mod mock;
pub mod prober;
pub mod serial;
pub mod verifier;

pub use auto_detect::{AutoDetectConfig, AutoDetector, DetectedDevice};
pub use error::{DetectorError, Result};
pub use mock::{MockCatalog, MockFactory};
pub use prober::{DeviceProber, LossReason, ProbeOutcome, ProbeWinner};
pub use serial::{SerialCatalog, SerialFactory, SerialTransport};
pub use verifier::MaskVerifier;
