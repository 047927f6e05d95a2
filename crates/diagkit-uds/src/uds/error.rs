//! UDS protocol and frame codec errors

use thiserror::Error;

use super::NegativeResponseCode;
use super::ServiceKind;
use crate::transport::TransportError;

/// Frame-level decode/encode failures.
///
/// These indicate a protocol or registry mismatch, not a transient bus
/// fault; the dispatch loop skips the offending frame and keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown service id 0x{sid:02X} in frame [{frame}]")]
    UnknownService { sid: u8, frame: String },

    #[error("service {kind:?} is not registered in this protocol variant")]
    UnregisteredKind { kind: ServiceKind },

    #[error("service id 0x{sid:02X} already assigned in this protocol variant")]
    DuplicateSid { sid: u8 },

    #[error("malformed {what} frame [{frame}]: {reason}")]
    Malformed {
        what: &'static str,
        frame: String,
        reason: &'static str,
    },
}

impl CodecError {
    pub(crate) fn malformed(what: &'static str, frame: &[u8], reason: &'static str) -> Self {
        Self::Malformed {
            what,
            frame: hex::encode_upper(frame),
            reason,
        }
    }
}

/// Errors surfaced to callers of the transaction broker and the layers on
/// top of it.
#[derive(Debug, Error)]
pub enum UdsError {
    /// Terminal negative response from the ECU.
    #[error("negative response for service 0x{sid:02X}: {code} (0x{code:02X})")]
    Negative {
        sid: u8,
        code: NegativeResponseCode,
    },

    /// No terminal response arrived within the wait budget.
    #[error("response timeout")]
    Timeout,

    /// The dispatch loop has ended; no further responses can arrive.
    #[error("session closed")]
    SessionClosed,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A positive response arrived but its body is not what the operation
    /// expects (setup/protocol mismatch).
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("security access failed: {0}")]
    SecurityAccess(String),
}

impl UdsError {
    /// True when the error is a negative response with the given code.
    pub fn is_negative(&self, code: NegativeResponseCode) -> bool {
        matches!(self, UdsError::Negative { code: c, .. } if *c == code)
    }
}
