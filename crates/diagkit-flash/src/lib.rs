//! diagkit-flash - byte-addressable access to ECU flash and RAM images
//!
//! Everything here works against the [`MemorySource`] boundary: a
//! byte-addressable source that may be an in-memory image
//! ([`RamSource`]), a window into another source ([`Region`]), or the
//! live ECU itself (the UDS-backed source lives in diagkit-uds). Sources
//! compose: `Region` and [`EncryptedRegion`] both implement
//! `MemorySource`, so an encrypted window over a live ECU region is
//! `Region::new(EncryptedRegion::new(ecu, cipher), base, len)`.
//!
//! [`EncryptedRegion`] hides the vendor block cipher: callers read and
//! write arbitrary offsets/lengths and the codec performs block-aligned
//! read-modify-write underneath.

pub mod checksum;
mod encrypted;
mod error;
pub mod param;
mod region;
mod source;

pub use encrypted::EncryptedRegion;
pub use error::FlashError;
pub use param::Parameter;
pub use region::Region;
pub use source::{MemorySource, RamSource};
