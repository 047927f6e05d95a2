//! Integration test fixtures for the diagkit engine.
//!
//! The centerpiece is [`EcuSimulator`]: a [`Transport`] implementation
//! that behaves like a small ECU, answering session control, security
//! access and memory requests against a backing byte image. Tests drive
//! the real broker/codec/flash stack against it with no bus.

use std::sync::Arc;

use async_trait::async_trait;
use diagkit_crypto::{derive_key, SeedKeyAlgorithm};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use diagkit_uds::uds::frame::{self, NegativeResponse};
use diagkit_uds::{
    Direction, FrameBody, NegativeResponseCode, Request, Response, ServiceRegistry, Transport,
    TransportError, TransportFrame,
};

/// The vendor Feistel key the simulator validates keys against.
pub const VENDOR_KEY: [u8; 8] = [0xC1, 0xE5, 0x6F, 0xEE, 0xE6, 0x92, 0x70, 0x83];

/// Install a fmt subscriber honoring `RUST_LOG`; safe to call from every
/// test, only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// The fixed seed the simulator hands out.
pub const SEED: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// A scripted little ECU behind the transport boundary.
pub struct EcuSimulator {
    registry: ServiceRegistry,
    reply_id: u32,
    memory: Mutex<Vec<u8>>,
    unlocked: Mutex<bool>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<TransportFrame>>,
    inbound_tx: mpsc::Sender<TransportFrame>,
}

impl EcuSimulator {
    pub fn new(reply_id: u32, memory: Vec<u8>) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        Arc::new(Self {
            registry: ServiceRegistry::standard(),
            reply_id,
            memory: Mutex::new(memory),
            unlocked: Mutex::new(false),
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
        })
    }

    pub fn memory(&self) -> Vec<u8> {
        self.memory.lock().clone()
    }

    pub fn is_unlocked(&self) -> bool {
        *self.unlocked.lock()
    }

    fn respond(&self, response: Response) -> Vec<u8> {
        frame::encode_response(&self.registry, &response).expect("simulator response encodes")
    }

    fn reject(&self, rejected_sid: u8, code: NegativeResponseCode) -> Vec<u8> {
        frame::encode_negative(&NegativeResponse { rejected_sid, code })
    }

    fn handle(&self, request: Request, sid: u8) -> Option<Vec<u8>> {
        match request {
            Request::SessionControl { session } => Some(self.respond(Response::SessionControl {
                session,
                parameters: vec![0x00, 0x19],
            })),
            Request::EcuReset { reset_type } => {
                *self.unlocked.lock() = false;
                Some(self.respond(Response::EcuReset { reset_type }))
            }
            Request::SecuritySeed { .. } => Some(self.respond(Response::SecuritySeed {
                level: 0x01,
                seed: SEED.to_vec(),
            })),
            Request::SecurityKey { level, key } => {
                let expected = derive_key(&SeedKeyAlgorithm::Feistel(VENDOR_KEY), &SEED)
                    .expect("seed derives");
                if key == expected {
                    *self.unlocked.lock() = true;
                    Some(self.respond(Response::SecurityKey { level }))
                } else {
                    Some(self.reject(sid, NegativeResponseCode::InvalidKey))
                }
            }
            Request::ReadMemory { address, length } => {
                let memory = self.memory.lock();
                let start = address as usize;
                let end = start + length as usize;
                if end > memory.len() {
                    return Some(self.reject(sid, NegativeResponseCode::RequestOutOfRange));
                }
                Some(self.respond(Response::ReadMemory {
                    data: memory[start..end].to_vec(),
                }))
            }
            Request::WriteMemory { address, data } => {
                let mut memory = self.memory.lock();
                let start = address as usize;
                let end = start + data.len();
                if end > memory.len() {
                    return Some(self.reject(sid, NegativeResponseCode::RequestOutOfRange));
                }
                memory[start..end].copy_from_slice(&data);
                Some(self.respond(Response::WriteMemory {
                    address,
                    length: data.len() as u16,
                }))
            }
            Request::TesterPresent { suppress_response } => {
                (!suppress_response).then(|| self.respond(Response::TesterPresent))
            }
            Request::ReadDataById { dids } => Some(self.respond(Response::ReadDataById {
                did: dids[0],
                data: vec![0x0B, 0xB8],
            })),
        }
    }
}

#[async_trait]
impl Transport for EcuSimulator {
    async fn recv(&self) -> Result<Option<TransportFrame>, TransportError> {
        Ok(self.inbound_rx.lock().await.recv().await)
    }

    async fn send(&self, address: u32, data: &[u8]) -> Result<(), TransportError> {
        let decoded = frame::decode(&self.registry, address, Direction::Outbound, data)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        let request = match decoded.body {
            FrameBody::Request(request) => request,
            other => {
                return Err(TransportError::SendFailed(format!(
                    "simulator received a non-request frame: {other:?}"
                )))
            }
        };
        debug!(?request, "simulator handling request");

        if let Some(reply) = self.handle(request, data[0]) {
            self.inbound_tx
                .try_send(TransportFrame::new(self.reply_id, reply))
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }
}
