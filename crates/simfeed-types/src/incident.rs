//! Transient traffic incident annotations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::{IncidentType, Severity};

/// A simulated traffic event stored inside an item's incident list.
///
/// Incidents live in the store as plain JSON objects; [`Incident::to_value`]
/// produces that representation without a fallible serializer round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Incident category.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// Human-readable description drawn from the type's phrase table.
    pub description: String,
    /// Impact on traffic.
    pub severity: Severity,
    /// When the incident was synthesized.
    pub reported: DateTime<Utc>,
}

impl Incident {
    /// Render the incident as the JSON object stored in the item.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            "type".to_owned(),
            Value::String(self.incident_type.as_str().to_owned()),
        );
        object.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        object.insert(
            "severity".to_owned(),
            Value::String(self.severity.as_str().to_owned()),
        );
        object.insert(
            "reported".to_owned(),
            Value::String(self.reported.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        Value::Object(object)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn to_value_reads_back_as_incident() {
        let incident = Incident {
            incident_type: IncidentType::Closure,
            description: "Exit closed".to_owned(),
            severity: Severity::Major,
            reported: Utc::now(),
        };
        let value = incident.to_value();
        assert_eq!(value["type"], "closure");
        assert_eq!(value["severity"], "major");

        let back: Incident = serde_json::from_value(value).unwrap();
        assert_eq!(back.incident_type, IncidentType::Closure);
        assert_eq!(back.description, "Exit closed");
    }
}
