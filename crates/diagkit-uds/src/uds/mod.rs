//! UDS (Unified Diagnostic Services) protocol layer
//!
//! Service-id constants, the service registry (the closed sid <-> service
//! table for one protocol variant), the frame codec and the negative
//! response codes.

mod error;
pub mod frame;
mod nrc;

pub use error::{CodecError, UdsError};
pub use frame::{Direction, Frame, FrameBody, NegativeResponse, Request, Response};
pub use nrc::NegativeResponseCode;

use std::collections::HashMap;

/// Standard UDS service ID constants
pub mod service_id {
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const ECU_RESET: u8 = 0x11;
    pub const READ_DATA_BY_ID: u8 = 0x22;
    pub const READ_MEMORY_BY_ADDRESS: u8 = 0x23;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const WRITE_MEMORY_BY_ADDRESS: u8 = 0x3D;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;

    /// Positive responses carry the request sid plus this offset.
    pub const POSITIVE_OFFSET: u8 = 0x40;
}

/// The services this engine speaks, independent of their numeric ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    SessionControl,
    EcuReset,
    ReadDataById,
    ReadMemory,
    SecurityAccess,
    WriteMemory,
    TesterPresent,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 7] = [
        ServiceKind::SessionControl,
        ServiceKind::EcuReset,
        ServiceKind::ReadDataById,
        ServiceKind::ReadMemory,
        ServiceKind::SecurityAccess,
        ServiceKind::WriteMemory,
        ServiceKind::TesterPresent,
    ];
}

/// Bidirectional service-id table for one protocol variant.
///
/// Every registered kind has exactly one sid; lookups of unregistered
/// kinds or unknown sids fail loudly instead of defaulting. OEM variants
/// start from [`ServiceRegistry::standard`] and remap or drop entries.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    by_kind: HashMap<ServiceKind, u8>,
    by_sid: HashMap<u8, ServiceKind>,
}

impl ServiceRegistry {
    /// The ISO 14229 standard assignment.
    pub fn standard() -> Self {
        let mut registry = Self {
            by_kind: HashMap::new(),
            by_sid: HashMap::new(),
        };
        let table = [
            (ServiceKind::SessionControl, service_id::DIAGNOSTIC_SESSION_CONTROL),
            (ServiceKind::EcuReset, service_id::ECU_RESET),
            (ServiceKind::ReadDataById, service_id::READ_DATA_BY_ID),
            (ServiceKind::ReadMemory, service_id::READ_MEMORY_BY_ADDRESS),
            (ServiceKind::SecurityAccess, service_id::SECURITY_ACCESS),
            (ServiceKind::WriteMemory, service_id::WRITE_MEMORY_BY_ADDRESS),
            (ServiceKind::TesterPresent, service_id::TESTER_PRESENT),
        ];
        for (kind, sid) in table {
            registry.by_kind.insert(kind, sid);
            registry.by_sid.insert(sid, kind);
        }
        registry
    }

    /// Reassign a service to an OEM-specific id.
    pub fn remap(mut self, kind: ServiceKind, sid: u8) -> Result<Self, CodecError> {
        if sid == service_id::NEGATIVE_RESPONSE || self.by_sid.contains_key(&sid) {
            return Err(CodecError::DuplicateSid { sid });
        }
        if let Some(old) = self.by_kind.insert(kind, sid) {
            self.by_sid.remove(&old);
        }
        self.by_sid.insert(sid, kind);
        Ok(self)
    }

    /// Drop a service from this variant entirely.
    pub fn without(mut self, kind: ServiceKind) -> Self {
        if let Some(sid) = self.by_kind.remove(&kind) {
            self.by_sid.remove(&sid);
        }
        self
    }

    /// The sid assigned to `kind` in this variant.
    pub fn sid(&self, kind: ServiceKind) -> Result<u8, CodecError> {
        self.by_kind
            .get(&kind)
            .copied()
            .ok_or(CodecError::UnregisteredKind { kind })
    }

    /// The kind registered under `sid`, if any.
    pub fn kind_of(&self, sid: u8) -> Option<ServiceKind> {
        self.by_sid.get(&sid).copied()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
