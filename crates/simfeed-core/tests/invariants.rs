//! Range and shape invariants checked over many seeded ticks.
//!
//! Each test loads a configuration document through the public loader, runs
//! the engine repeatedly, and checks the invariant after every tick.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use simfeed_core::config::{ConfigSource, load};
use simfeed_core::constraint::decimal_places;
use simfeed_core::engine::RuleEngine;
use simfeed_core::path;
use simfeed_core::store::Store;
use simfeed_types::CollectionKind;

const TICKS: usize = 300;

const SENSORS: &str = r#"{
    "config": {"update_interval": 5},
    "collections": [{
        "name": "sensors",
        "items": [
            {
                "id": "temp-001",
                "type": "temperature",
                "value": 22.5,
                "update_rules": {"value": {
                    "type": "random_float", "min_change": -0.5, "max_change": 0.5,
                    "min_value": 15, "max_value": 30, "precision": 2
                }}
            },
            {
                "id": "pres-001",
                "type": "pressure",
                "value": 1013.25,
                "update_rules": {"value": {
                    "type": "random_float", "min_change": -3, "max_change": 3,
                    "min_value": 1000.004, "max_value": 1020, "precision": 1
                }}
            },
            {
                "id": "occ-001",
                "type": "occupancy",
                "count": 10,
                "update_rules": {"count": {
                    "type": "random_int", "min_change": -4, "max_change": 4,
                    "min_value": 0, "max_value": 12
                }}
            },
            {
                "id": "status-001",
                "type": "status",
                "state": "online",
                "update_rules": {"state": {"type": "random_choice", "choices": ["online", "offline", "degraded"]}}
            }
        ]
    }]
}"#;

const TRAFFIC: &str = r"
config:
  update_interval: 5
collections:
  - name: traffic
    kind: geojson
    items:
      - type: Feature
        geometry:
          type: Point
          coordinates: [10.0, 20.0]
        properties:
          id: bus-1
          type: bus
          speed: 30
          incidents: []
        update_rules:
          geometry.coordinates:
            type: geo_movement
            speed_knots: 40
            heading_variation: 180
            bounds: [9.99, 19.99, 10.01, 20.01]
          properties.speed:
            type: random_int
            min_change: -5
            max_change: 5
            min_value: 0
            max_value: 60
          properties.incidents:
            type: random_incidents
            probability: 0.6
            max_incidents: 2
";

fn run<F>(source: ConfigSource<'_>, seed: u64, mut check: F)
where
    F: FnMut(&Store),
{
    let (mut store, config) = load(source).unwrap();
    let mut engine = RuleEngine::new(StdRng::seed_from_u64(seed), config.update_interval_secs());
    for _ in 0..TICKS {
        engine.tick(&mut store);
        check(&store);
    }
}

fn sensor<'a>(store: &'a Store, id: &str) -> &'a serde_json::Map<String, Value> {
    store
        .collection("sensors")
        .unwrap()
        .find_by_id(id)
        .unwrap()
        .fields()
}

#[test]
fn float_values_stay_in_range_and_precision() {
    run(ConfigSource::Json(SENSORS), 1, |store| {
        let temp = sensor(store, "temp-001")["value"].as_f64().unwrap();
        assert!((15.0..=30.0).contains(&temp), "{temp}");
        assert!(decimal_places(temp) <= 2, "{temp}");

        let pressure = sensor(store, "pres-001")["value"].as_f64().unwrap();
        assert!((1000.004..=1020.0).contains(&pressure), "{pressure}");
        assert!(decimal_places(pressure) <= 1, "{pressure}");
    });
}

#[test]
fn int_values_stay_integral_and_in_range() {
    run(ConfigSource::Json(SENSORS), 2, |store| {
        let count = &sensor(store, "occ-001")["count"];
        assert!(count.is_i64(), "{count}");
        assert!((0..=12).contains(&count.as_i64().unwrap()));
    });
}

#[test]
fn choices_come_from_the_list() {
    run(ConfigSource::Json(SENSORS), 3, |store| {
        let state = sensor(store, "status-001")["state"].as_str().unwrap();
        assert!(["online", "offline", "degraded"].contains(&state));
    });
}

#[test]
fn points_stay_in_bounds() {
    run(ConfigSource::Yaml(TRAFFIC), 4, |store| {
        let feature = store.collection("traffic").unwrap().find_by_id("bus-1").unwrap();
        let coords = path::get(feature.fields(), "geometry.coordinates").unwrap();
        let lon = coords[0].as_f64().unwrap();
        let lat = coords[1].as_f64().unwrap();
        assert!((9.99..=10.01).contains(&lon), "{lon}");
        assert!((19.99..=20.01).contains(&lat), "{lat}");
    });
}

#[test]
fn incident_lists_respect_capacity() {
    let mut seen_any = false;
    run(ConfigSource::Yaml(TRAFFIC), 5, |store| {
        let feature = store.collection("traffic").unwrap().find_by_id("bus-1").unwrap();
        let incidents = path::get(feature.fields(), "properties.incidents")
            .and_then(Value::as_array)
            .unwrap();
        assert!(incidents.len() <= 2);
        seen_any |= !incidents.is_empty();
        for incident in incidents {
            assert!(incident["description"].is_string());
            assert!(["minor", "moderate", "major"].contains(&incident["severity"].as_str().unwrap()));
        }
    });
    assert!(seen_any);
}

#[test]
fn timestamps_never_decrease() {
    let (mut store, _) = load(ConfigSource::Yaml(TRAFFIC)).unwrap();
    let mut engine = RuleEngine::new(StdRng::seed_from_u64(6), 5.0);
    let stamp = |store: &Store| {
        store.collection("traffic").unwrap().items[0]
            .last_updated(CollectionKind::Geojson)
            .unwrap()
            .to_owned()
    };
    let mut previous = stamp(&store);
    for _ in 0..20 {
        engine.tick(&mut store);
        let next = stamp(&store);
        // RFC 3339 in UTC with fixed precision sorts lexically.
        assert!(next >= previous, "{next} < {previous}");
        previous = next;
    }
}

#[test]
fn loading_twice_gives_same_values() {
    let strip = |store: &Store| {
        let mut values = Vec::new();
        for (name, collection) in store.collections() {
            for item in &collection.items {
                let mut fields = item.fields().clone();
                fields.remove("last_updated");
                if let Some(Value::Object(props)) = fields.get_mut("properties") {
                    props.remove("last_updated");
                }
                values.push((name.to_owned(), Value::Object(fields)));
            }
        }
        values
    };
    for source in [ConfigSource::Json(SENSORS), ConfigSource::Yaml(TRAFFIC)] {
        let (first, _) = load(source).unwrap();
        let (second, _) = load(source).unwrap();
        assert_eq!(strip(&first), strip(&second));
    }
}

#[test]
fn path_round_trip_on_loaded_items() {
    let (store, _) = load(ConfigSource::Yaml(TRAFFIC)).unwrap();
    let feature = store.collection("traffic").unwrap().items[0].fields().clone();
    let cases = [
        ("geometry.coordinates.0", json!(11.5)),
        ("properties.speed", json!(12)),
        ("properties.incidents.3.type", json!("closure")),
        ("properties.lanes.open", json!(true)),
        ("id", json!("bus-1")),
    ];
    for (target, value) in cases {
        let mut fields = feature.clone();
        path::set(&mut fields, target, value.clone()).unwrap();
        assert_eq!(path::get(&fields, target), Some(&value), "{target}");
    }
}
