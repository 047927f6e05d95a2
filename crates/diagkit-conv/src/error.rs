//! Conversion errors

use thiserror::Error;

use crate::types::DataType;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvError {
    #[error("expected {expected} raw bytes for {data_type:?}, got {got}")]
    LengthMismatch {
        data_type: DataType,
        expected: usize,
        got: usize,
    },

    #[error("value {0} is not a finite number")]
    NonFinite(f64),

    #[error("scale factor must be non-zero")]
    ZeroScale,
}
