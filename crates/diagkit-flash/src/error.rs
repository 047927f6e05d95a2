//! Flash access errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlashError {
    /// Access outside the addressable range of a source or region.
    #[error("access at offset 0x{offset:X} (+{len}) outside source of {size} bytes")]
    OutOfRange { offset: u32, len: usize, size: u32 },

    /// The underlying source returned fewer bytes than the block span
    /// requires; the ciphertext cannot be decrypted consistently.
    #[error("short read at offset 0x{offset:X}: expected {expected} bytes, got {got}")]
    ShortRead {
        offset: u32,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Cipher(#[from] diagkit_crypto::CipherError),

    #[error(transparent)]
    Conv(#[from] diagkit_conv::ConvError),

    /// Failure in a lower-level source (e.g. the UDS-backed one).
    #[error("memory source failure: {0}")]
    Source(String),
}
