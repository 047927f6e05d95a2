//! Transparent block-cipher codec over a memory source.

use async_trait::async_trait;
use diagkit_crypto::{FeistelCipher, BLOCK_SIZE};
use tracing::trace;

use crate::error::FlashError;
use crate::source::MemorySource;

/// Presents a cipher-encrypted source as plain bytes.
///
/// Callers read and write arbitrary offsets and lengths; the codec
/// expands every access to the inclusive span of cipher blocks covering
/// it, so mid-block and cross-block ranges work without the caller
/// knowing the block size. Writes are read-modify-write: the touched
/// blocks are decrypted first so their untouched bytes survive.
///
/// Read-modify-write is not atomic. Concurrent access to overlapping
/// blocks must be serialized by the caller.
#[derive(Debug)]
pub struct EncryptedRegion<S> {
    source: S,
    cipher: FeistelCipher,
}

impl<S: MemorySource> EncryptedRegion<S> {
    pub fn new(source: S, cipher: FeistelCipher) -> Self {
        Self { source, cipher }
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Block-aligned span covering `[offset, offset + len)`.
    fn span(offset: u32, len: usize) -> (u32, usize) {
        let block = BLOCK_SIZE as u64;
        let start = (offset as u64 / block) * block;
        let end = (offset as u64 + len as u64).div_ceil(block) * block;
        (start as u32, (end - start) as usize)
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), FlashError> {
        let end = offset as u64 + len as u64;
        if end > self.source.size() as u64 {
            return Err(FlashError::OutOfRange {
                offset,
                len,
                size: self.source.size(),
            });
        }
        Ok(())
    }

    /// Read and decrypt the full block span for an access.
    async fn load_span(&mut self, start: u32, span_len: usize) -> Result<Vec<u8>, FlashError> {
        let mut buf = vec![0u8; span_len];
        let got = self.source.read_at(start, &mut buf).await?;
        if got != span_len {
            return Err(FlashError::ShortRead {
                offset: start,
                expected: span_len,
                got,
            });
        }
        self.cipher.decrypt_in_place(&mut buf)?;
        Ok(buf)
    }
}

#[async_trait]
impl<S: MemorySource> MemorySource for EncryptedRegion<S> {
    async fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, FlashError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.check_range(offset, buf.len())?;

        let (start, span_len) = Self::span(offset, buf.len());
        let plain = self.load_span(start, span_len).await?;

        let skip = (offset - start) as usize;
        buf.copy_from_slice(&plain[skip..skip + buf.len()]);
        Ok(buf.len())
    }

    async fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(offset, data.len())?;

        let (start, span_len) = Self::span(offset, data.len());
        trace!(offset, len = data.len(), start, span_len, "encrypted write");

        let mut plain = self.load_span(start, span_len).await?;
        let skip = (offset - start) as usize;
        plain[skip..skip + data.len()].copy_from_slice(data);

        self.cipher.encrypt_in_place(&mut plain)?;
        self.source.write_at(start, &plain).await
    }

    async fn probe(&mut self, offset: u32) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read_at(offset, &mut byte).await {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn size(&self) -> u32 {
        self.source.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RamSource;

    const KEY: [u8; 8] = [0xC1, 0xE5, 0x6F, 0xEE, 0xE6, 0x92, 0x70, 0x83];

    fn encrypted_image(plain: &[u8]) -> RamSource {
        let cipher = FeistelCipher::new(&KEY);
        let mut data = plain.to_vec();
        cipher.encrypt_in_place(&mut data).unwrap();
        RamSource::new(data)
    }

    #[tokio::test]
    async fn reads_any_unaligned_range() {
        let plain: Vec<u8> = (0..32).collect();
        let mut region = EncryptedRegion::new(encrypted_image(&plain), FeistelCipher::new(&KEY));

        let mut buf = [0u8; 5];
        assert_eq!(region.read_at(3, &mut buf).await.unwrap(), 5);
        assert_eq!(buf, [3, 4, 5, 6, 7]);

        let mut all = vec![0u8; 32];
        region.read_at(0, &mut all).await.unwrap();
        assert_eq!(all, plain);
    }

    #[tokio::test]
    async fn unaligned_write_preserves_block_neighbors() {
        let plain: Vec<u8> = (0..16).collect();
        let mut region = EncryptedRegion::new(encrypted_image(&plain), FeistelCipher::new(&KEY));

        // Write 3 bytes straddling blocks 1 and 2.
        region.write_at(6, &[0xAA, 0xBB, 0xCC]).await.unwrap();

        let mut all = vec![0u8; 16];
        region.read_at(0, &mut all).await.unwrap();
        assert_eq!(
            all,
            [0, 1, 2, 3, 4, 5, 0xAA, 0xBB, 0xCC, 9, 10, 11, 12, 13, 14, 15]
        );
    }

    #[tokio::test]
    async fn ciphertext_actually_differs_from_plaintext() {
        let plain: Vec<u8> = (1..=16).collect();
        let mut image = encrypted_image(&plain);
        let mut raw = vec![0u8; 16];
        image.read_at(0, &mut raw).await.unwrap();
        assert_ne!(raw, plain);
    }

    #[tokio::test]
    async fn out_of_range_and_short_reads_are_distinct() {
        let mut region = EncryptedRegion::new(RamSource::zeroed(8), FeistelCipher::new(&KEY));
        let mut buf = [0u8; 4];
        assert!(matches!(
            region.read_at(6, &mut buf).await,
            Err(FlashError::OutOfRange { .. })
        ));

        // A source that lies about its size produces a short read.
        struct Liar(RamSource);
        #[async_trait]
        impl MemorySource for Liar {
            async fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, FlashError> {
                self.0.read_at(offset, buf).await
            }
            async fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
                self.0.write_at(offset, data).await
            }
            async fn probe(&mut self, offset: u32) -> Option<u8> {
                self.0.probe(offset).await
            }
            fn size(&self) -> u32 {
                16
            }
        }
        let mut lying = EncryptedRegion::new(Liar(RamSource::zeroed(8)), FeistelCipher::new(&KEY));
        let mut buf = [0u8; 4];
        assert!(matches!(
            lying.read_at(10, &mut buf).await,
            Err(FlashError::ShortRead { .. })
        ));
    }
}
