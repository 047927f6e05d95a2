//! Display precision derived from the scale factor.
//!
//! Keeps converted values presentable (13.0, not 13.000000001).

/// Decimal places needed to represent values produced by `scale`.
pub fn precision_from_scale(scale: f64) -> u8 {
    if scale <= 0.0 {
        return 4;
    }

    let abs_scale = scale.abs();
    if abs_scale >= 1.0 {
        return 0;
    }

    // Multiply by 10 until the scale is (close enough to) an integer;
    // 0.25 needs 2 places, 0.001 needs 3.
    let mut temp = abs_scale;
    let mut precision = 0u8;
    while precision < 6 {
        if (temp - temp.round()).abs() < 1e-9 {
            break;
        }
        temp *= 10.0;
        precision += 1;
    }

    precision
}

/// Round a value to a fixed number of decimal places.
pub fn round_to_precision(value: f64, precision: u8) -> f64 {
    if precision == 0 {
        value.round()
    } else {
        let factor = 10_f64.powi(precision as i32);
        (value * factor).round() / factor
    }
}

/// Round a value based on the scale factor that produced it.
pub fn round_for_scale(value: f64, scale: f64) -> f64 {
    round_to_precision(value, precision_from_scale(scale))
}
