//! Transport boundary: reassembled ISO-TP payloads in and out.
//!
//! The engine never sees CAN frames or segmentation; this boundary
//! delivers whole UDS payloads tagged with their bus address. `recv`
//! returning `Ok(None)` is the orderly end of the session, not a fault.

mod error;
mod mock;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use error::TransportError;
pub use mock::MockTransport;

use async_trait::async_trait;

/// One reassembled payload with the bus identifier it was seen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFrame {
    pub address: u32,
    pub data: Vec<u8>,
}

impl TransportFrame {
    pub fn new(address: u32, data: Vec<u8>) -> Self {
        Self { address, data }
    }
}

/// The physical transport the broker multiplexes.
///
/// Exactly one task calls `recv` (the dispatch loop); `send` may be
/// called from any task. No in-order or guaranteed delivery is assumed
/// beyond what the implementation provides.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Next inbound frame; `Ok(None)` when the session has ended.
    async fn recv(&self) -> Result<Option<TransportFrame>, TransportError>;

    /// Write one payload to the given bus address.
    async fn send(&self, address: u32, data: &[u8]) -> Result<(), TransportError>;
}
