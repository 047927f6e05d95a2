//! Scaled parameter access through a memory source.

use diagkit_conv::{decode, encode, Scaling, Storage};

use crate::error::FlashError;
use crate::source::MemorySource;

/// A named value at a fixed address, stored in a raw format and read or
/// written in engineering units through the conversion pipeline.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub address: u32,
    pub storage: Storage,
    pub scaling: Scaling,
}

impl Parameter {
    pub fn new(name: impl Into<String>, address: u32, storage: Storage, scaling: Scaling) -> Self {
        Self {
            name: name.into(),
            address,
            storage,
            scaling,
        }
    }

    /// Read the parameter's physical value from `source`.
    pub async fn read<S: MemorySource>(&self, source: &mut S) -> Result<f64, FlashError> {
        let mut raw = vec![0u8; self.storage.size()];
        let got = source.read_at(self.address, &mut raw).await?;
        if got != raw.len() {
            return Err(FlashError::ShortRead {
                offset: self.address,
                expected: raw.len(),
                got,
            });
        }
        Ok(decode(&self.storage, &self.scaling, &raw)?)
    }

    /// Write a physical value to `source`.
    pub async fn write<S: MemorySource>(&self, source: &mut S, value: f64) -> Result<(), FlashError> {
        let raw = encode(&self.storage, &self.scaling, value)?;
        source.write_at(self.address, &raw).await
    }
}
