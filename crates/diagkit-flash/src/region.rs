//! Bounded windows over a memory source.

use async_trait::async_trait;

use crate::error::FlashError;
use crate::source::MemorySource;

/// A base+length window into another source.
///
/// All offsets are relative to the region base; any access crossing the
/// window boundary fails with [`FlashError::OutOfRange`] rather than
/// being truncated.
#[derive(Debug)]
pub struct Region<S> {
    source: S,
    base: u32,
    len: u32,
}

impl<S: MemorySource> Region<S> {
    pub fn new(source: S, base: u32, len: u32) -> Result<Self, FlashError> {
        let end = base.checked_add(len);
        match end {
            Some(end) if end <= source.size() => Ok(Self { source, base, len }),
            _ => Err(FlashError::OutOfRange {
                offset: base,
                len: len as usize,
                size: source.size(),
            }),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Consume the region, returning the wrapped source.
    pub fn into_inner(self) -> S {
        self.source
    }

    fn translate(&self, offset: u32, len: usize) -> Result<u32, FlashError> {
        let end = (offset as u64) + (len as u64);
        if end > self.len as u64 {
            return Err(FlashError::OutOfRange {
                offset,
                len,
                size: self.len,
            });
        }
        Ok(self.base + offset)
    }
}

#[async_trait]
impl<S: MemorySource> MemorySource for Region<S> {
    async fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, FlashError> {
        let abs = self.translate(offset, buf.len())?;
        self.source.read_at(abs, buf).await
    }

    async fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        let abs = self.translate(offset, data.len())?;
        self.source.write_at(abs, data).await
    }

    async fn probe(&mut self, offset: u32) -> Option<u8> {
        if offset >= self.len {
            return None;
        }
        self.source.probe(self.base + offset).await
    }

    fn size(&self) -> u32 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RamSource;

    #[tokio::test]
    async fn offsets_are_relative_to_base() {
        let src = RamSource::new((0..16).collect());
        let mut region = Region::new(src, 4, 8).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(region.read_at(0, &mut buf).await.unwrap(), 2);
        assert_eq!(buf, [4, 5]);
        assert_eq!(region.probe(7).await, Some(11));
        assert_eq!(region.probe(8).await, None);
    }

    #[tokio::test]
    async fn boundary_crossing_access_fails() {
        let src = RamSource::new(vec![0; 16]);
        let mut region = Region::new(src, 4, 8).unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(
            region.read_at(6, &mut buf).await,
            Err(FlashError::OutOfRange { offset: 6, len: 4, size: 8 })
        ));
        assert!(region.write_at(7, &[1, 2]).await.is_err());
    }

    #[test]
    fn region_must_fit_inside_its_source() {
        let src = RamSource::new(vec![0; 8]);
        assert!(Region::new(src, 4, 8).is_err());
    }
}
