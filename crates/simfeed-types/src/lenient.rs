//! Forgiving deserializers for rule parameters.
//!
//! Rule parameters come from hand-written configuration. A parameter of the
//! wrong JSON type, or a number that cannot be represented, decodes to `None`
//! so the rule falls back to its documented default instead of failing the
//! whole rule.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::rules::GeoBounds;

/// Largest precision honoured by float rounding; `f64` carries ~15
/// significant decimal digits.
pub const MAX_PRECISION: u32 = 15;

/// Decode an optional finite float.
pub fn finite_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(as_finite_f64))
}

/// Decode an optional integer, accepting integral floats such as `3.0`.
pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(as_integer))
}

/// Decode an optional non-negative count.
pub fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(as_integer)
        .and_then(|n| u64::try_from(n).ok()))
}

/// Decode an optional decimal precision, capped at [`MAX_PRECISION`].
pub fn precision<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(as_integer)
        .and_then(|n| u32::try_from(n).ok())
        .map(|p| p.min(MAX_PRECISION)))
}

/// Decode a list of choices; anything other than an array becomes empty.
pub fn value_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(values)) => values,
        _ => Vec::new(),
    })
}

/// Decode a `[min_lon, min_lat, max_lon, max_lat]` rectangle.
pub fn bounds<'de, D>(deserializer: D) -> Result<Option<GeoBounds>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(values)) = raw else {
        return Ok(None);
    };
    let corners: Option<Vec<f64>> = values.iter().map(as_finite_f64).collect();
    Ok(corners
        .and_then(|c| <[f64; 4]>::try_from(c).ok())
        .and_then(|c| GeoBounds::try_from(c).ok()))
}

fn as_finite_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract().abs() < f64::EPSILON)
        .filter(|f| *f >= -9_223_372_036_854_775_808.0 && *f < 9_223_372_036_854_775_808.0)
        .map(|f| f as i64)
}
