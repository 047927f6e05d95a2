//! Flash image checksum verification.

use crc::Crc;
use tracing::warn;

use crate::error::FlashError;
use crate::source::MemorySource;

const CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// CRC-32 of a byte slice (ISO-HDLC polynomial, the common "crc32").
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// One protected byte range of an image and its expected checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumRange {
    pub start: u32,
    pub len: u32,
    pub expected: u32,
}

/// Verify every range against the source; returns one pass/fail per range.
pub async fn verify<S: MemorySource>(
    source: &mut S,
    ranges: &[ChecksumRange],
) -> Result<Vec<bool>, FlashError> {
    let mut results = Vec::with_capacity(ranges.len());
    for range in ranges {
        let mut buf = vec![0u8; range.len as usize];
        let got = source.read_at(range.start, &mut buf).await?;
        if got != buf.len() {
            return Err(FlashError::ShortRead {
                offset: range.start,
                expected: buf.len(),
                got,
            });
        }
        let actual = crc32(&buf);
        let ok = actual == range.expected;
        if !ok {
            warn!(
                start = format_args!("0x{:X}", range.start),
                len = range.len,
                expected = format_args!("0x{:08X}", range.expected),
                actual = format_args!("0x{:08X}", actual),
                "checksum mismatch"
            );
        }
        results.push(ok);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RamSource;

    #[test]
    fn crc32_known_vector() {
        // Standard CRC-32 check value for "123456789".
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[tokio::test]
    async fn verifies_ranges_independently() {
        let mut source = RamSource::new(b"123456789XXXX".to_vec());
        let ranges = [
            ChecksumRange {
                start: 0,
                len: 9,
                expected: 0xCBF4_3926,
            },
            ChecksumRange {
                start: 9,
                len: 4,
                expected: 0xDEAD_BEEF,
            },
        ];
        let results = verify(&mut source, &ranges).await.unwrap();
        assert_eq!(results, vec![true, false]);
    }
}
