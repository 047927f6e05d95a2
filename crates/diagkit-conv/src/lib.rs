//! diagkit-conv - raw byte to engineering unit conversion
//!
//! ECU memory holds raw fixed-width values; tables and live parameters are
//! defined in engineering units. This crate is the conversion seam between
//! the two: a storage format (width, signedness, endianness), a linear
//! scaling (scale factor + offset), and display precision derived from the
//! scale.
//!
//! The conversion is a pure function of (format, scaling, bytes); nothing
//! here talks to a bus or a memory image.

mod convert;
mod error;
mod precision;
mod types;

pub use convert::{decode, encode};
pub use error::ConvError;
pub use precision::{precision_from_scale, round_for_scale, round_to_precision};
pub use types::{ByteOrder, DataType, Scaling, Storage};
