//! UDS Negative Response Codes (NRC)

use std::fmt;

/// Negative response reason codes this engine can meet.
///
/// `ResponsePending` is the one non-terminal code: it signals the ECU is
/// still working and the transaction must stay open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NegativeResponseCode {
    GeneralReject = 0x10,
    ServiceNotSupported = 0x11,
    SubFunctionNotSupported = 0x12,
    IncorrectMessageLengthOrFormat = 0x13,
    BusyRepeatRequest = 0x21,
    ConditionsNotCorrect = 0x22,
    RequestSequenceError = 0x24,
    RequestOutOfRange = 0x31,
    SecurityAccessDenied = 0x33,
    InvalidKey = 0x35,
    ExceededNumberOfAttempts = 0x36,
    RequiredTimeDelayNotExpired = 0x37,
    UploadDownloadNotAccepted = 0x70,
    GeneralProgrammingFailure = 0x72,
    ResponsePending = 0x78,
    SubFunctionNotSupportedInActiveSession = 0x7E,
    ServiceNotSupportedInActiveSession = 0x7F,

    /// Unknown/reserved NRC
    Unknown(u8),
}

impl NegativeResponseCode {
    /// True for the non-terminal "request received, response pending" code.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::ResponsePending)
    }
}

impl From<u8> for NegativeResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0x10 => Self::GeneralReject,
            0x11 => Self::ServiceNotSupported,
            0x12 => Self::SubFunctionNotSupported,
            0x13 => Self::IncorrectMessageLengthOrFormat,
            0x21 => Self::BusyRepeatRequest,
            0x22 => Self::ConditionsNotCorrect,
            0x24 => Self::RequestSequenceError,
            0x31 => Self::RequestOutOfRange,
            0x33 => Self::SecurityAccessDenied,
            0x35 => Self::InvalidKey,
            0x36 => Self::ExceededNumberOfAttempts,
            0x37 => Self::RequiredTimeDelayNotExpired,
            0x70 => Self::UploadDownloadNotAccepted,
            0x72 => Self::GeneralProgrammingFailure,
            0x78 => Self::ResponsePending,
            0x7E => Self::SubFunctionNotSupportedInActiveSession,
            0x7F => Self::ServiceNotSupportedInActiveSession,
            other => Self::Unknown(other),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(nrc: NegativeResponseCode) -> Self {
        match nrc {
            NegativeResponseCode::GeneralReject => 0x10,
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupported => 0x12,
            NegativeResponseCode::IncorrectMessageLengthOrFormat => 0x13,
            NegativeResponseCode::BusyRepeatRequest => 0x21,
            NegativeResponseCode::ConditionsNotCorrect => 0x22,
            NegativeResponseCode::RequestSequenceError => 0x24,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::SecurityAccessDenied => 0x33,
            NegativeResponseCode::InvalidKey => 0x35,
            NegativeResponseCode::ExceededNumberOfAttempts => 0x36,
            NegativeResponseCode::RequiredTimeDelayNotExpired => 0x37,
            NegativeResponseCode::UploadDownloadNotAccepted => 0x70,
            NegativeResponseCode::GeneralProgrammingFailure => 0x72,
            NegativeResponseCode::ResponsePending => 0x78,
            NegativeResponseCode::SubFunctionNotSupportedInActiveSession => 0x7E,
            NegativeResponseCode::ServiceNotSupportedInActiveSession => 0x7F,
            NegativeResponseCode::Unknown(v) => v,
        }
    }
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeneralReject => write!(f, "GeneralReject"),
            Self::ServiceNotSupported => write!(f, "ServiceNotSupported"),
            Self::SubFunctionNotSupported => write!(f, "SubFunctionNotSupported"),
            Self::IncorrectMessageLengthOrFormat => write!(f, "IncorrectMessageLengthOrFormat"),
            Self::BusyRepeatRequest => write!(f, "BusyRepeatRequest"),
            Self::ConditionsNotCorrect => write!(f, "ConditionsNotCorrect"),
            Self::RequestSequenceError => write!(f, "RequestSequenceError"),
            Self::RequestOutOfRange => write!(f, "RequestOutOfRange"),
            Self::SecurityAccessDenied => write!(f, "SecurityAccessDenied"),
            Self::InvalidKey => write!(f, "InvalidKey"),
            Self::ExceededNumberOfAttempts => write!(f, "ExceededNumberOfAttempts"),
            Self::RequiredTimeDelayNotExpired => write!(f, "RequiredTimeDelayNotExpired"),
            Self::UploadDownloadNotAccepted => write!(f, "UploadDownloadNotAccepted"),
            Self::GeneralProgrammingFailure => write!(f, "GeneralProgrammingFailure"),
            Self::ResponsePending => write!(f, "ResponsePending"),
            Self::SubFunctionNotSupportedInActiveSession => {
                write!(f, "SubFunctionNotSupportedInActiveSession")
            }
            Self::ServiceNotSupportedInActiveSession => {
                write!(f, "ServiceNotSupportedInActiveSession")
            }
            Self::Unknown(v) => write!(f, "Unknown(0x{:02X})", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_roundtrip() {
        for value in 0u8..=0xFF {
            let nrc = NegativeResponseCode::from(value);
            assert_eq!(u8::from(nrc), value);
        }
    }

    #[test]
    fn only_0x78_is_pending() {
        assert!(NegativeResponseCode::ResponsePending.is_pending());
        assert!(!NegativeResponseCode::InvalidKey.is_pending());
        assert!(!NegativeResponseCode::Unknown(0x79).is_pending());
    }
}
