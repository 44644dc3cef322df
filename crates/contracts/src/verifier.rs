//! Verifier trait - decides whether observed bytes identify the target device

/// Stateless device verification capability
///
/// Implementations are shared read-only across every probing loop of a round.
pub trait Verifier: Send + Sync {
    /// Whether `chunk` belongs to the target device
    fn check(&self, chunk: &[u8]) -> bool;

    /// Identification key, used for bookkeeping only
    fn key(&self) -> &[u8];
}
