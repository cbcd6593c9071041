//! Random draws shared by the rule implementations.

use rand::Rng;

/// Uniform draw in `[low, high]`.
///
/// Interpolates instead of building a `rand` range so that spans wider than
/// `f64::MAX` still yield a finite value. Returns `low` when the endpoints
/// are inverted or not finite.
pub fn uniform<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    if !(low.is_finite() && high.is_finite()) || low > high {
        return low;
    }
    let t: f64 = rng.random();
    low.mul_add(1.0 - t, high * t)
}

/// Uniform draw in `[-magnitude, magnitude]`, zero for a non-positive or
/// non-finite magnitude.
pub fn jitter<R: Rng>(rng: &mut R, magnitude: f64) -> f64 {
    if magnitude > 0.0 && magnitude.is_finite() {
        uniform(rng, -magnitude, magnitude)
    } else {
        0.0
    }
}
