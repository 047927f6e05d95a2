//! Raw byte decode/encode through a storage format and scaling

use crate::error::ConvError;
use crate::precision::round_for_scale;
use crate::types::{ByteOrder, DataType, Scaling, Storage};

/// Decode raw bytes into a physical (engineering-unit) value.
pub fn decode(storage: &Storage, scaling: &Scaling, raw: &[u8]) -> Result<f64, ConvError> {
    if raw.len() != storage.size() {
        return Err(ConvError::LengthMismatch {
            data_type: storage.data_type,
            expected: storage.size(),
            got: raw.len(),
        });
    }

    let value = match (storage.data_type, storage.byte_order) {
        (DataType::Uint8, _) => raw[0] as f64,
        (DataType::Int8, _) => raw[0] as i8 as f64,
        (DataType::Uint16, ByteOrder::Big) => u16::from_be_bytes([raw[0], raw[1]]) as f64,
        (DataType::Uint16, ByteOrder::Little) => u16::from_le_bytes([raw[0], raw[1]]) as f64,
        (DataType::Int16, ByteOrder::Big) => i16::from_be_bytes([raw[0], raw[1]]) as f64,
        (DataType::Int16, ByteOrder::Little) => i16::from_le_bytes([raw[0], raw[1]]) as f64,
        (DataType::Uint32, ByteOrder::Big) => {
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64
        }
        (DataType::Uint32, ByteOrder::Little) => {
            u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64
        }
        (DataType::Float32, ByteOrder::Big) => {
            f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64
        }
        (DataType::Float32, ByteOrder::Little) => {
            f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64
        }
    };

    Ok(round_for_scale(scaling.raw_to_phys(value), scaling.scale))
}

/// Encode a physical value into raw bytes, saturating to the storage range.
pub fn encode(storage: &Storage, scaling: &Scaling, phys: f64) -> Result<Vec<u8>, ConvError> {
    if !phys.is_finite() {
        return Err(ConvError::NonFinite(phys));
    }
    if scaling.scale == 0.0 {
        return Err(ConvError::ZeroScale);
    }

    let raw = scaling.phys_to_raw(phys);
    let (lo, hi) = storage.data_type.raw_range();
    let raw = raw.clamp(lo, hi);

    let bytes = match (storage.data_type, storage.byte_order) {
        (DataType::Uint8, _) => vec![raw.round() as u8],
        (DataType::Int8, _) => vec![(raw.round() as i8) as u8],
        (DataType::Uint16, ByteOrder::Big) => (raw.round() as u16).to_be_bytes().to_vec(),
        (DataType::Uint16, ByteOrder::Little) => (raw.round() as u16).to_le_bytes().to_vec(),
        (DataType::Int16, ByteOrder::Big) => (raw.round() as i16).to_be_bytes().to_vec(),
        (DataType::Int16, ByteOrder::Little) => (raw.round() as i16).to_le_bytes().to_vec(),
        (DataType::Uint32, ByteOrder::Big) => (raw.round() as u32).to_be_bytes().to_vec(),
        (DataType::Uint32, ByteOrder::Little) => (raw.round() as u32).to_le_bytes().to_vec(),
        (DataType::Float32, ByteOrder::Big) => (raw as f32).to_be_bytes().to_vec(),
        (DataType::Float32, ByteOrder::Little) => (raw as f32).to_le_bytes().to_vec(),
    };

    Ok(bytes)
}
