//! Enumeration types for the Simfeed simulator.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// How field paths inside a collection's items are interpreted.
///
/// Unrecognized kind strings degrade to [`CollectionKind::Standard`] rather
/// than failing the whole configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// GeoJSON Features; rule keys are dot paths into `geometry` and
    /// `properties`, and the timestamp lives under `properties`.
    #[serde(alias = "GeoJSON", alias = "geoJSON")]
    Geojson,
    /// Flat records; rule keys are literal field names.
    // `other` must sit on the last variant.
    #[default]
    #[serde(other)]
    Standard,
}

impl CollectionKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Geojson => "geojson",
            Self::Standard => "standard",
        }
    }

    /// Whether rule keys are dot paths for this kind.
    pub const fn uses_dot_paths(self) -> bool {
        matches!(self, Self::Geojson)
    }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Category of a simulated traffic incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    /// A collision between vehicles.
    Accident,
    /// Road or utility work.
    Construction,
    /// A public gathering affecting traffic.
    Event,
    /// A closed road, bridge, or ramp.
    Closure,
}

impl IncidentType {
    /// Every incident type, in draw order.
    pub const ALL: [Self; 4] = [
        Self::Accident,
        Self::Construction,
        Self::Event,
        Self::Closure,
    ];

    /// Wire name of the incident type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accident => "accident",
            Self::Construction => "construction",
            Self::Event => "event",
            Self::Closure => "closure",
        }
    }

    /// Phrase table that descriptions are drawn from.
    pub const fn descriptions(self) -> &'static [&'static str] {
        match self {
            Self::Accident => &[
                "Vehicle collision",
                "Multi-car accident",
                "Traffic accident",
                "Minor fender bender",
            ],
            Self::Construction => &[
                "Road work",
                "Lane closure",
                "Utility work",
                "Bridge maintenance",
            ],
            Self::Event => &["Parade", "Sports event", "Festival", "Demonstration"],
            Self::Closure => &[
                "Road closed",
                "Bridge closed",
                "Exit closed",
                "On-ramp closed",
            ],
        }
    }
}

/// How badly an incident affects traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Little or no delay.
    Minor,
    /// Noticeable delay.
    Moderate,
    /// Severe delay or blockage.
    Major,
}

impl Severity {
    /// Every severity, in draw order.
    pub const ALL: [Self; 3] = [Self::Minor, Self::Moderate, Self::Major];

    /// Wire name of the severity.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn collection_kind_parses_known_names() {
        let kind: CollectionKind = serde_json::from_str("\"geojson\"").unwrap();
        assert_eq!(kind, CollectionKind::Geojson);
        let kind: CollectionKind = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(kind, CollectionKind::Standard);
    }

    #[test]
    fn collection_kind_unknown_degrades_to_standard() {
        let kind: CollectionKind = serde_json::from_str("\"timeseries\"").unwrap();
        assert_eq!(kind, CollectionKind::Standard);
        assert_eq!(CollectionKind::default(), CollectionKind::Standard);
        let kind: CollectionKind = serde_json::from_str("\"GeoJSON\"").unwrap();
        assert_eq!(kind, CollectionKind::Geojson);
    }

    #[test]
    fn every_incident_type_has_four_descriptions() {
        for kind in IncidentType::ALL {
            assert_eq!(kind.descriptions().len(), 4, "{}", kind.as_str());
        }
    }

    #[test]
    fn wire_names_match_serde() {
        for kind in IncidentType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
        for severity in Severity::ALL {
            let json = serde_json::to_value(severity).unwrap();
            assert_eq!(json, severity.as_str());
        }
    }
}
