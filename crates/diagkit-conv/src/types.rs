//! Storage format and scaling definitions

use serde::{Deserialize, Serialize};

/// Fixed-width storage type of a raw value in ECU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Float32,
}

impl DataType {
    /// Width of the raw value in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Float32 => 4,
        }
    }

    /// Representable raw range, used to saturate encoded values.
    pub fn raw_range(&self) -> (f64, f64) {
        match self {
            DataType::Uint8 => (0.0, u8::MAX as f64),
            DataType::Int8 => (i8::MIN as f64, i8::MAX as f64),
            DataType::Uint16 => (0.0, u16::MAX as f64),
            DataType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::Uint32 => (0.0, u32::MAX as f64),
            DataType::Float32 => (f64::MIN, f64::MAX),
        }
    }
}

/// Byte order of multi-byte raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// Storage format: width/signedness plus endianness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub data_type: DataType,
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl Storage {
    pub fn new(data_type: DataType, byte_order: ByteOrder) -> Self {
        Self {
            data_type,
            byte_order,
        }
    }

    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Linear raw-to-physical conversion: `physical = raw * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub scale: f64,
    pub offset: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl Scaling {
    pub fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    pub fn raw_to_phys(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    pub fn phys_to_raw(&self, phys: f64) -> f64 {
        (phys - self.offset) / self.scale
    }
}
