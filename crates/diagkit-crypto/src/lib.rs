//! diagkit-crypto - vendor cryptography for ECU diagnostics
//!
//! Two primitives live here:
//!
//! - [`FeistelCipher`]: the vendor 32-bit block cipher used both for the
//!   security-access seed/key exchange and for transparent flash
//!   encryption. Four rounds over 16-bit halves, one 16-bit round key per
//!   round; the decryption schedule is the encryption schedule reversed.
//! - [`SeedKeyAlgorithm`] / [`derive_key`]: turns a security-access seed
//!   into the key response, using either the Feistel cipher or AES-128
//!   depending on ECU family.

mod feistel;
mod seedkey;

pub use feistel::{FeistelCipher, BLOCK_SIZE};
pub use seedkey::{derive_key, SeedKeyAlgorithm};

use thiserror::Error;

/// Errors from the cipher primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Buffer length is not a multiple of the cipher block size.
    #[error("buffer length {len} is not a multiple of the {block}-byte block size")]
    UnalignedLength { len: usize, block: usize },

    /// Seed length does not match what the selected algorithm consumes.
    #[error("seed length {got} not usable, algorithm requires {expected}")]
    SeedLength { expected: usize, got: usize },
}
