//! The byte-addressable source boundary.

use async_trait::async_trait;

use crate::error::FlashError;

/// A byte-addressable memory source.
///
/// Reads return the number of bytes actually copied and may come up short
/// near the end of the source (callers that need exact counts check).
/// Writes are all-or-nothing within the addressable range.
#[async_trait]
pub trait MemorySource: Send {
    /// Read up to `buf.len()` bytes starting at `offset`.
    async fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, FlashError>;

    /// Write `data` starting at `offset`.
    async fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Single-byte probe; `None` when `offset` is outside the source.
    async fn probe(&mut self, offset: u32) -> Option<u8>;

    /// Addressable size in bytes.
    fn size(&self) -> u32;
}

/// An in-memory source: a RAM/flash image held as plain bytes.
#[derive(Debug, Clone)]
pub struct RamSource {
    data: Vec<u8>,
}

impl RamSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// A zero-filled source of the given size.
    pub fn zeroed(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[async_trait]
impl MemorySource for RamSource {
    async fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, FlashError> {
        let start = offset as usize;
        if start >= self.data.len() {
            return Ok(0);
        }
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        Ok(n)
    }

    async fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        let start = offset as usize;
        let end = start.checked_add(data.len()).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                self.data[start..end].copy_from_slice(data);
                Ok(())
            }
            None => Err(FlashError::OutOfRange {
                offset,
                len: data.len(),
                size: self.data.len() as u32,
            }),
        }
    }

    async fn probe(&mut self, offset: u32) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }
}
