//! diagkit-uds - UDS diagnostic engine for ECUs over ISO-TP/CAN
//!
//! One physical transport, many logical conversations:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Broker                            │
//! │                                                          │
//! │  callers ──request()──► active table ◄──match── dispatch │
//! │     │                  (one slot per sid)          │     │
//! │     └── Transaction::wait() ◄── complete ──────────┘     │
//! │                                                          │
//! │                    ┌───────────┐                         │
//! │                    │FrameCodec │  sid registry,          │
//! │                    │ (uds::*)  │  typed bodies           │
//! │                    └─────┬─────┘                         │
//! │                          │                               │
//! │                 ┌────────┴────────┐                      │
//! │                 │   Transport     │  ISO-TP payloads     │
//! │                 │ (mock/socketcan)│                      │
//! │                 └─────────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! On top of the broker: the security-access handshake
//! ([`security::unlock`]), the session manager with keepalive
//! ([`SessionManager`]), and [`EcuMemorySource`], which exposes live ECU
//! memory through the diagkit-flash source boundary.

pub mod broker;
pub mod component;
pub mod config;
pub mod memory;
pub mod security;
pub mod session;
pub mod transport;
pub mod uds;

pub use broker::{Broker, BrokerBuilder, Transaction, DEFAULT_RESPONSE_BUDGET};
pub use component::Component;
pub use config::{ConfigError, EngineConfig, SessionConfig};
pub use memory::EcuMemorySource;
pub use security::{unlock, SecurityKeyMaterial};
pub use session::{SessionManager, SessionState};
pub use transport::{MockTransport, Transport, TransportError, TransportFrame};
pub use uds::{
    CodecError, Direction, Frame, FrameBody, NegativeResponse, NegativeResponseCode, Request,
    Response, ServiceKind, ServiceRegistry, UdsError,
};
