//! Jittered drift of GeoJSON Points.
//!
//! Each tick a point moves roughly north by a speed-dependent step. Speed and
//! heading are perturbed independently; the result is clamped per axis to the
//! rule's bounding rectangle. Positions that hit a bound stay on it rather
//! than reflecting.
//!
//! The step is a flat-earth approximation: about 0.0003 degrees per knot per
//! five seconds, with no correction for latitude.

use rand::Rng;
use simfeed_types::GeoMovementRule;

use crate::draw::jitter;

/// Degrees travelled per knot during one reference interval.
pub const DEGREES_PER_KNOT: f64 = 0.0003;

/// Interval, in seconds, that [`DEGREES_PER_KNOT`] is expressed against.
pub const REFERENCE_INTERVAL_SECS: f64 = 5.0;

/// Converts rule parameters into per-tick displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoMotionModel {
    /// Seconds between ticks.
    update_interval_secs: f64,
}

impl GeoMotionModel {
    /// Model for a scheduler ticking every `update_interval_secs` seconds.
    pub const fn new(update_interval_secs: f64) -> Self {
        Self {
            update_interval_secs,
        }
    }

    /// Seconds between ticks.
    pub const fn update_interval_secs(&self) -> f64 {
        self.update_interval_secs
    }

    /// Angular step, in degrees, for a tick at `speed_knots`.
    pub fn step_degrees(&self, speed_knots: f64) -> f64 {
        speed_knots * DEGREES_PER_KNOT * (self.update_interval_secs / REFERENCE_INTERVAL_SECS)
    }

    /// Draw a speed and heading and move `position` one tick.
    pub fn advance<R: Rng>(
        &self,
        position: [f64; 2],
        rule: &GeoMovementRule,
        rng: &mut R,
    ) -> [f64; 2] {
        let speed = rule.speed_knots() + jitter(rng, rule.speed_variation());
        let heading = jitter(rng, rule.heading_variation());
        let moved = self.displace(position, speed, heading);
        rule.bounds().clamp(moved)
    }

    /// Move `position` at `speed_knots` along `heading_degrees` off due
    /// north, without clamping.
    pub fn displace(&self, [lon, lat]: [f64; 2], speed_knots: f64, heading_degrees: f64) -> [f64; 2] {
        let step = self.step_degrees(speed_knots);
        let (sin, cos) = heading_degrees.to_radians().sin_cos();
        [lon + step * sin, lat + step * cos]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use simfeed_types::GeoBounds;

    use super::*;

    fn rule(bounds: Option<GeoBounds>) -> GeoMovementRule {
        GeoMovementRule {
            speed_knots: Some(10.0),
            speed_variation: Some(1.0),
            heading_variation: Some(10.0),
            bounds,
        }
    }

    #[test]
    fn step_scales_with_interval() {
        let model = GeoMotionModel::new(5.0);
        assert!((model.step_degrees(10.0) - 0.003).abs() < 1e-12);
        let slow = GeoMotionModel::new(10.0);
        assert!((slow.step_degrees(10.0) - 0.006).abs() < 1e-12);
    }

    #[test]
    fn due_north_only_changes_latitude() {
        let model = GeoMotionModel::new(5.0);
        let [lon, lat] = model.displace([10.0, 20.0], 10.0, 0.0);
        assert_eq!(lon, 10.0);
        assert!((lat - 20.003).abs() < 1e-12);
    }

    #[test]
    fn moves_stay_near_origin() {
        let model = GeoMotionModel::new(5.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let [lon, lat] = model.advance([10.0, 20.0], &rule(None), &mut rng);
            let distance = (lon - 10.0).hypot(lat - 20.0);
            assert!(distance <= 0.0033 + 1e-9, "moved {distance}");
            assert!(lat > 20.0, "heading stays within 10 degrees of north");
        }
    }

    #[test]
    fn positions_stay_in_bounds() {
        let bounds = GeoBounds::try_from([-0.001, -0.001, 0.001, 0.001]).unwrap();
        let model = GeoMotionModel::new(60.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut position = [0.0, 0.0];
        for _ in 0..200 {
            position = model.advance(position, &rule(Some(bounds)), &mut rng);
            assert!(bounds.contains(position), "{position:?}");
        }
        // Steady northward drift pins the point to the top edge.
        assert_eq!(position[1], 0.001);
    }

    #[test]
    fn zero_variation_is_deterministic() {
        let model = GeoMotionModel::new(5.0);
        let still = GeoMovementRule {
            speed_knots: Some(0.0),
            speed_variation: Some(0.0),
            heading_variation: Some(0.0),
            bounds: None,
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(model.advance([1.5, 2.5], &still, &mut rng), [1.5, 2.5]);
    }
}
