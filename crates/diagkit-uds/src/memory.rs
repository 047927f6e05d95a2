//! Live ECU memory as a byte-addressable source.
//!
//! Implements the diagkit-flash [`MemorySource`] boundary over UDS
//! ReadMemoryByAddress/WriteMemoryByAddress, so the encrypted codec and
//! parameter access work against a running ECU exactly as they do
//! against an image file.

use std::sync::Arc;

use async_trait::async_trait;
use diagkit_flash::{FlashError, MemorySource};
use tracing::trace;

use crate::broker::Broker;
use crate::component::Component;
use crate::uds::{Request, Response};

const DEFAULT_CHUNK: u16 = 0x80;

/// A window of ECU memory reached through the broker.
///
/// Accesses are split into bus-sized chunks; each chunk is one UDS
/// request/response exchange with the usual timeout and negative-response
/// handling.
pub struct EcuMemorySource {
    broker: Arc<Broker>,
    component: Component,
    base: u32,
    size: u32,
    chunk: u16,
}

impl EcuMemorySource {
    pub fn new(broker: Arc<Broker>, component: Component, base: u32, size: u32) -> Self {
        Self {
            broker,
            component,
            base,
            size,
            chunk: DEFAULT_CHUNK,
        }
    }

    /// Maximum bytes moved per bus exchange.
    pub fn with_chunk_size(mut self, chunk: u16) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    async fn read_chunk(&self, address: u32, length: u16) -> Result<Vec<u8>, FlashError> {
        let tx = self
            .broker
            .request(
                &self.component,
                Request::ReadMemory { address, length },
            )
            .await
            .map_err(|e| FlashError::Source(e.to_string()))?;
        match tx.wait().await.map_err(|e| FlashError::Source(e.to_string()))? {
            Some(Response::ReadMemory { data }) => {
                if data.len() != length as usize {
                    return Err(FlashError::ShortRead {
                        offset: address,
                        expected: length as usize,
                        got: data.len(),
                    });
                }
                Ok(data)
            }
            other => Err(FlashError::Source(format!(
                "memory read answered with {other:?}"
            ))),
        }
    }

    async fn write_chunk(&self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let tx = self
            .broker
            .request(
                &self.component,
                Request::WriteMemory {
                    address,
                    data: data.to_vec(),
                },
            )
            .await
            .map_err(|e| FlashError::Source(e.to_string()))?;
        match tx.wait().await.map_err(|e| FlashError::Source(e.to_string()))? {
            Some(Response::WriteMemory { .. }) => Ok(()),
            other => Err(FlashError::Source(format!(
                "memory write answered with {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl MemorySource for EcuMemorySource {
    async fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, FlashError> {
        if offset >= self.size {
            return Ok(0);
        }
        let available = (self.size - offset) as usize;
        let total = buf.len().min(available);

        let mut done = 0usize;
        while done < total {
            let length = ((total - done).min(self.chunk as usize)) as u16;
            let address = self.base + offset + done as u32;
            trace!(
                address = format_args!("0x{address:X}"),
                length,
                "ECU memory read chunk"
            );
            let data = self.read_chunk(address, length).await?;
            buf[done..done + length as usize].copy_from_slice(&data);
            done += length as usize;
        }
        Ok(total)
    }

    async fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        let end = offset as u64 + data.len() as u64;
        if end > self.size as u64 {
            return Err(FlashError::OutOfRange {
                offset,
                len: data.len(),
                size: self.size,
            });
        }

        let mut done = 0usize;
        while done < data.len() {
            let length = (data.len() - done).min(self.chunk as usize);
            let address = self.base + offset + done as u32;
            trace!(
                address = format_args!("0x{address:X}"),
                length,
                "ECU memory write chunk"
            );
            self.write_chunk(address, &data[done..done + length]).await?;
            done += length;
        }
        Ok(())
    }

    async fn probe(&mut self, offset: u32) -> Option<u8> {
        if offset >= self.size {
            return None;
        }
        let mut byte = [0u8; 1];
        match self.read_at(offset, &mut byte).await {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn size(&self) -> u32 {
        self.size
    }
}
