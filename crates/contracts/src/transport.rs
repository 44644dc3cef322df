//! Transport / DeviceCatalog traits - external byte-stream capabilities
//!
//! The core never opens hardware itself: it receives transports from a
//! [`TransportFactory`] and candidate identifiers from a [`DeviceCatalog`].

use std::future::Future;

use crate::{ContractError, TransportError};

/// Byte-stream endpoint
///
/// Read semantics:
/// - `Ok(n)` with `n > 0`: `n` bytes were written to the front of `buf`
/// - `Ok(0)`: nothing available within the backend's poll interval, read again
/// - `Err(TransportError::EndOfStream)`: the stream ended normally
/// - any other `Err`: read failure, fatal to the owning loop
///
/// `close` must be called exactly once by the current owner.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Endpoint identifier (port path or name)
    fn id(&self) -> &str;

    /// Read available bytes into `buf`
    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data`, returning the number of bytes written
    async fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Release the endpoint
    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens transports by identifier
pub trait TransportFactory: Send + Sync {
    /// Transport produced by this factory
    type Transport: Transport + Sync + 'static;

    /// Open the endpoint named `id`
    fn open(&self, id: &str)
        -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Enumerates candidate endpoints, once per probing round
pub trait DeviceCatalog: Send + Sync {
    /// Current candidate identifiers
    fn enumerate_ports(&self) -> Result<Vec<String>, ContractError>;
}
