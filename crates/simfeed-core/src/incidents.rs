//! Probabilistic synthesis of traffic incidents.
//!
//! On every tick an incident list gets one probability draw. A successful
//! draw synthesizes a fresh [`Incident`] and appends it, first evicting
//! randomly chosen existing entries until there is room under the capacity.
//! A failed draw leaves the list untouched.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::Value;
use simfeed_types::{Incident, IncidentRule, IncidentType, Severity};

/// Run one probability draw against `current`.
///
/// Returns the new list when an incident was added, `None` when the draw
/// failed and the list should stay as it is.
pub fn maybe_add<R: Rng>(
    current: &[Value],
    rule: &IncidentRule,
    reported: DateTime<Utc>,
    rng: &mut R,
) -> Option<Vec<Value>> {
    let draw: f64 = rng.random();
    if draw >= rule.probability() {
        return None;
    }

    let capacity = rule.max_incidents();
    let mut incidents = current.to_vec();
    while !incidents.is_empty() && incidents.len() >= capacity {
        let victim = rng.random_range(0..incidents.len());
        incidents.remove(victim);
    }
    incidents.push(generate(reported, rng).to_value());
    Some(incidents)
}

/// Synthesize one incident with a uniformly drawn type, severity, and
/// description.
pub fn generate<R: Rng>(reported: DateTime<Utc>, rng: &mut R) -> Incident {
    let incident_type = IncidentType::ALL
        .choose(rng)
        .copied()
        .unwrap_or(IncidentType::Accident);
    let severity = Severity::ALL
        .choose(rng)
        .copied()
        .unwrap_or(Severity::Minor);
    let description = incident_type
        .descriptions()
        .choose(rng)
        .copied()
        .unwrap_or_default()
        .to_owned();

    Incident {
        incident_type,
        description,
        severity,
        reported,
    }
}
