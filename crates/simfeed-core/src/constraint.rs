//! Clamping and rounding of numeric rule results.
//!
//! Floats are clamped first and rounded second. When a bound does not sit on
//! the rounding grid (say `15.004` at precision 2) the rounded value can land
//! just outside the range; it is then snapped to the nearest grid value that
//! lies inside. If no grid value fits between the bounds the clamped value is
//! kept as is.

/// Clamp `value` to `[min, max]` and round it to `precision` decimal digits.
///
/// Bounds that are NaN or inverted leave the value unclamped.
pub fn clamp_float(value: f64, min: f64, max: f64, precision: u32) -> f64 {
    if min.is_nan() || max.is_nan() || min > max {
        return round_to(value, precision);
    }
    let clamped = value.clamp(min, max);
    let Some(scale) = grid_scale(precision) else {
        return clamped;
    };
    let scaled = clamped * scale;
    if !scaled.is_finite() {
        return clamped;
    }

    let rounded = scaled.round() / scale;
    if rounded > max {
        let snapped = (max * scale).floor() / scale;
        return if snapped >= min { snapped } else { clamped };
    }
    if rounded < min {
        let snapped = (min * scale).ceil() / scale;
        return if snapped <= max { snapped } else { clamped };
    }
    rounded
}

/// Clamp `value` to `[min, max]` and truncate it toward zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn clamp_int(value: f64, min: i64, max: i64) -> i64 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    if value.is_nan() {
        return min;
    }
    // `as` saturates at the i64 range; the final clamp restores the bounds
    // after truncation.
    let truncated = value.clamp(min as f64, max as f64).trunc() as i64;
    truncated.clamp(min, max)
}

/// Round `value` to `precision` decimal digits, half away from zero.
pub fn round_to(value: f64, precision: u32) -> f64 {
    match grid_scale(precision) {
        Some(scale) if (value * scale).is_finite() => (value * scale).round() / scale,
        _ => value,
    }
}

/// Number of decimal digits after the point in the shortest rendering of
/// `value`.
pub fn decimal_places(value: f64) -> usize {
    let rendered = value.to_string();
    rendered
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.trim_end_matches('0').len())
}

fn grid_scale(precision: u32) -> Option<f64> {
    let exponent = i32::try_from(precision).ok()?;
    Some(10_f64.powi(exponent))
}
