//! Declarative update rules attached to item fields.
//!
//! A [`Rule`] is decoded once, when the configuration is loaded, from the
//! `{"type": ..., ...params}` objects found under an item's `update_rules`.
//! Every parameter is optional on the wire; the accessor methods on each
//! parameter struct apply the documented defaults and fall back to them
//! whenever the supplied values are unusable (for example a change range
//! whose minimum exceeds its maximum).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default lower bound of a per-tick change.
pub const DEFAULT_MIN_CHANGE: i64 = -1;
/// Default upper bound of a per-tick change.
pub const DEFAULT_MAX_CHANGE: i64 = 1;
/// Default decimal precision of float rules.
pub const DEFAULT_PRECISION: u32 = 2;
/// Default lower bound of integer rules.
pub const DEFAULT_INT_MIN_VALUE: i64 = 0;
/// Default upper bound of integer rules.
pub const DEFAULT_INT_MAX_VALUE: i64 = 100;
/// Default cruising speed of geo movement, in knots.
pub const DEFAULT_SPEED_KNOTS: f64 = 10.0;
/// Default speed jitter of geo movement, in knots.
pub const DEFAULT_SPEED_VARIATION: f64 = 1.0;
/// Default heading jitter of geo movement, in degrees.
pub const DEFAULT_HEADING_VARIATION: f64 = 10.0;
/// Default per-tick probability of a new incident.
pub const DEFAULT_INCIDENT_PROBABILITY: f64 = 0.1;
/// Default incident list capacity.
pub const DEFAULT_MAX_INCIDENTS: usize = 1;

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// How a single field evolves on every tick.
///
/// Unrecognized `type` tags decode to [`Rule::Unknown`], which the engine
/// treats as a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Random walk over a float, clamped and rounded.
    RandomFloat(FloatRule),
    /// Random walk over an integer, clamped.
    RandomInt(IntRule),
    /// Uniform pick from a fixed list of values.
    RandomChoice(ChoiceRule),
    /// Jittered northbound drift of a GeoJSON Point.
    GeoMovement(GeoMovementRule),
    /// Probabilistic synthesis of traffic incidents.
    RandomIncidents(IncidentRule),
    /// A rule kind this build does not understand.
    #[serde(other)]
    Unknown,
}

impl Rule {
    /// Decode a rule from its configuration object.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error when the object has no string
    /// `type` tag or is not an object at all.
    pub fn decode(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Wire name of the rule kind.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::RandomFloat(_) => "random_float",
            Self::RandomInt(_) => "random_int",
            Self::RandomChoice(_) => "random_choice",
            Self::GeoMovement(_) => "geo_movement",
            Self::RandomIncidents(_) => "random_incidents",
            Self::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// random_float
// ---------------------------------------------------------------------------

/// Parameters of a `random_float` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatRule {
    /// Smallest delta drawn per tick.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub min_change: Option<f64>,
    /// Largest delta drawn per tick.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub max_change: Option<f64>,
    /// Inclusive lower bound of the field.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Inclusive upper bound of the field.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Decimal digits kept after rounding.
    #[serde(default, deserialize_with = "lenient::precision", skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

impl FloatRule {
    /// Delta range `(low, high)` with `low <= high`.
    #[allow(clippy::cast_precision_loss)]
    pub fn change_range(&self) -> (f64, f64) {
        let fallback = (DEFAULT_MIN_CHANGE as f64, DEFAULT_MAX_CHANGE as f64);
        let low = self.min_change.unwrap_or(fallback.0);
        let high = self.max_change.unwrap_or(fallback.1);
        if low <= high { (low, high) } else { fallback }
    }

    /// Value bounds `(min, max)`; unbounded when absent or inverted.
    pub fn value_bounds(&self) -> (f64, f64) {
        let low = self.min_value.unwrap_or(f64::NEG_INFINITY);
        let high = self.max_value.unwrap_or(f64::INFINITY);
        if low <= high {
            (low, high)
        } else {
            (f64::NEG_INFINITY, f64::INFINITY)
        }
    }

    /// Decimal digits kept after rounding.
    pub fn precision(&self) -> u32 {
        self.precision
            .unwrap_or(DEFAULT_PRECISION)
            .min(lenient::MAX_PRECISION)
    }
}

// ---------------------------------------------------------------------------
// random_int
// ---------------------------------------------------------------------------

/// Parameters of a `random_int` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRule {
    /// Smallest delta drawn per tick.
    #[serde(default, deserialize_with = "lenient::integer", skip_serializing_if = "Option::is_none")]
    pub min_change: Option<i64>,
    /// Largest delta drawn per tick.
    #[serde(default, deserialize_with = "lenient::integer", skip_serializing_if = "Option::is_none")]
    pub max_change: Option<i64>,
    /// Inclusive lower bound of the field.
    #[serde(default, deserialize_with = "lenient::integer", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    /// Inclusive upper bound of the field.
    #[serde(default, deserialize_with = "lenient::integer", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
}

impl IntRule {
    /// Inclusive delta range `(low, high)` with `low <= high`.
    pub fn change_range(&self) -> (i64, i64) {
        let low = self.min_change.unwrap_or(DEFAULT_MIN_CHANGE);
        let high = self.max_change.unwrap_or(DEFAULT_MAX_CHANGE);
        if low <= high {
            (low, high)
        } else {
            (DEFAULT_MIN_CHANGE, DEFAULT_MAX_CHANGE)
        }
    }

    /// Value bounds `(min, max)`, defaulting to `[0, 100]`.
    pub fn value_bounds(&self) -> (i64, i64) {
        let low = self.min_value.unwrap_or(DEFAULT_INT_MIN_VALUE);
        let high = self.max_value.unwrap_or(DEFAULT_INT_MAX_VALUE);
        if low <= high {
            (low, high)
        } else {
            (DEFAULT_INT_MIN_VALUE, DEFAULT_INT_MAX_VALUE)
        }
    }
}

// ---------------------------------------------------------------------------
// random_choice
// ---------------------------------------------------------------------------

/// Parameters of a `random_choice` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRule {
    /// Candidate values, written back verbatim.
    #[serde(default, deserialize_with = "lenient::value_list")]
    pub choices: Vec<Value>,
}

// ---------------------------------------------------------------------------
// geo_movement
// ---------------------------------------------------------------------------

/// Axis-aligned lon/lat rectangle a moving point is confined to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", try_from = "[f64; 4]")]
pub struct GeoBounds {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl GeoBounds {
    /// The whole globe.
    pub const WORLD: Self = Self {
        min_lon: -180.0,
        min_lat: -90.0,
        max_lon: 180.0,
        max_lat: 90.0,
    };

    /// Clamp a `[lon, lat]` pair into the rectangle, one axis at a time.
    pub fn clamp(&self, [lon, lat]: [f64; 2]) -> [f64; 2] {
        [
            lon.clamp(self.min_lon, self.max_lon),
            lat.clamp(self.min_lat, self.max_lat),
        ]
    }

    /// Whether a `[lon, lat]` pair lies inside the rectangle (edges included).
    pub fn contains(&self, [lon, lat]: [f64; 2]) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }
}

impl TryFrom<[f64; 4]> for GeoBounds {
    type Error = String;

    fn try_from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Result<Self, Self::Error> {
        let finite = [min_lon, min_lat, max_lon, max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err("bounds must be finite".to_owned());
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err(format!(
                "inverted bounds [{min_lon}, {min_lat}, {max_lon}, {max_lat}]"
            ));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

impl From<GeoBounds> for [f64; 4] {
    fn from(b: GeoBounds) -> Self {
        [b.min_lon, b.min_lat, b.max_lon, b.max_lat]
    }
}

/// Parameters of a `geo_movement` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoMovementRule {
    /// Cruising speed in knots.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub speed_knots: Option<f64>,
    /// Maximum speed jitter in knots, applied symmetrically.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub speed_variation: Option<f64>,
    /// Maximum heading jitter in degrees either side of due north.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub heading_variation: Option<f64>,
    /// Rectangle the point is confined to.
    #[serde(default, deserialize_with = "lenient::bounds", skip_serializing_if = "Option::is_none")]
    pub bounds: Option<GeoBounds>,
}

impl GeoMovementRule {
    /// Cruising speed in knots.
    pub fn speed_knots(&self) -> f64 {
        self.speed_knots.unwrap_or(DEFAULT_SPEED_KNOTS)
    }

    /// Speed jitter magnitude in knots.
    pub fn speed_variation(&self) -> f64 {
        self.speed_variation.unwrap_or(DEFAULT_SPEED_VARIATION).abs()
    }

    /// Heading jitter magnitude in degrees.
    pub fn heading_variation(&self) -> f64 {
        self.heading_variation
            .unwrap_or(DEFAULT_HEADING_VARIATION)
            .abs()
    }

    /// Confinement rectangle, the whole globe by default.
    pub fn bounds(&self) -> GeoBounds {
        self.bounds.unwrap_or(GeoBounds::WORLD)
    }
}

// ---------------------------------------------------------------------------
// random_incidents
// ---------------------------------------------------------------------------

/// Parameters of a `random_incidents` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentRule {
    /// Chance per tick that a new incident is synthesized.
    #[serde(default, deserialize_with = "lenient::finite_f64", skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    /// Capacity of the incident list.
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub max_incidents: Option<u64>,
}

impl IncidentRule {
    /// Chance per tick that a new incident is synthesized.
    pub fn probability(&self) -> f64 {
        self.probability.unwrap_or(DEFAULT_INCIDENT_PROBABILITY)
    }

    /// Capacity of the incident list, never below one.
    pub fn max_incidents(&self) -> usize {
        self.max_incidents
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_INCIDENTS)
            .max(1)
    }
}
