//! Security-access key derivation.
//!
//! The ECU answers a seed request with a challenge; the tester proves it
//! holds the pre-shared key by sending back the seed run through the
//! family's symmetric algorithm.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::feistel::{FeistelCipher, BLOCK_SIZE};
use crate::CipherError;

const AES_SEED_LEN: usize = 16;

/// Pre-shared secret plus the algorithm an ECU family expects.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum SeedKeyAlgorithm {
    /// Vendor Feistel cipher over each 4-byte seed block.
    Feistel([u8; 8]),
    /// AES-128 ECB over a single 16-byte seed block.
    Aes128([u8; 16]),
}

impl std::fmt::Debug for SeedKeyAlgorithm {
    // Key bytes never reach logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feistel(_) => f.write_str("SeedKeyAlgorithm::Feistel(..)"),
            Self::Aes128(_) => f.write_str("SeedKeyAlgorithm::Aes128(..)"),
        }
    }
}

/// Compute the key response for a seed challenge.
pub fn derive_key(algorithm: &SeedKeyAlgorithm, seed: &[u8]) -> Result<Vec<u8>, CipherError> {
    match algorithm {
        SeedKeyAlgorithm::Feistel(key) => {
            if seed.is_empty() || seed.len() % BLOCK_SIZE != 0 {
                return Err(CipherError::UnalignedLength {
                    len: seed.len(),
                    block: BLOCK_SIZE,
                });
            }
            let cipher = FeistelCipher::new(key);
            let mut out = seed.to_vec();
            cipher.encrypt_in_place(&mut out)?;
            Ok(out)
        }
        SeedKeyAlgorithm::Aes128(key) => {
            if seed.len() != AES_SEED_LEN {
                return Err(CipherError::SeedLength {
                    expected: AES_SEED_LEN,
                    got: seed.len(),
                });
            }
            let cipher = Aes128::new(GenericArray::from_slice(key));
            let mut block = GenericArray::clone_from_slice(seed);
            cipher.encrypt_block(&mut block);
            Ok(block.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feistel_key_is_encrypted_seed() {
        let algorithm = SeedKeyAlgorithm::Feistel([0xC1, 0xE5, 0x6F, 0xEE, 0xE6, 0x92, 0x70, 0x83]);
        let key = derive_key(&algorithm, &[0, 0, 0, 0]).unwrap();
        assert_eq!(key, 0x98A4_9DE7u32.to_be_bytes());
    }

    #[test]
    fn feistel_handles_multi_block_seeds() {
        let algorithm = SeedKeyAlgorithm::Feistel([1, 2, 3, 4, 5, 6, 7, 8]);
        let key = derive_key(&algorithm, &[0x11; 8]).unwrap();
        assert_eq!(key.len(), 8);
        // Identical plaintext blocks encrypt identically (ECB-style).
        assert_eq!(key[..4], key[4..]);
    }

    #[test]
    fn feistel_rejects_unaligned_seed() {
        let algorithm = SeedKeyAlgorithm::Feistel([0; 8]);
        assert!(matches!(
            derive_key(&algorithm, &[1, 2, 3]),
            Err(CipherError::UnalignedLength { len: 3, .. })
        ));
    }

    #[test]
    fn aes_requires_16_byte_seed() {
        let algorithm = SeedKeyAlgorithm::Aes128([0x42; 16]);
        assert!(matches!(
            derive_key(&algorithm, &[0u8; 4]),
            Err(CipherError::SeedLength { expected: 16, got: 4 })
        ));
        let key = derive_key(&algorithm, &[0u8; 16]).unwrap();
        assert_eq!(key.len(), 16);
        // AES of the zero block under a non-zero key is not the zero block.
        assert_ne!(key, vec![0u8; 16]);
    }
}
