//! The documents shipped under `config/` load and tick cleanly.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use simfeed_core::config::{ConfigSource, load};
use simfeed_core::engine::RuleEngine;

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

#[test]
fn json_sample_loads() {
    let (mut store, config) = load(ConfigSource::Path(&sample("data_config.json"))).unwrap();
    assert_eq!(config.server.port, 5000);
    assert!(config.nats.is_none());
    assert_eq!(store.collection("sensors").unwrap().items.len(), 3);

    let report = RuleEngine::new(StdRng::seed_from_u64(1), config.update_interval_secs())
        .tick(&mut store);
    assert_eq!(report.fields_updated, 3);
    assert_eq!(report.skipped(), 0);
}

#[test]
fn yaml_sample_loads() {
    let (mut store, config) = load(ConfigSource::Path(&sample("data_config_geo.yaml"))).unwrap();
    assert_eq!(config.seed, Some(42));
    assert_eq!(config.nats.as_ref().unwrap().subject_prefix, "simfeed");
    assert!(store.contains("vehicles"));
    assert!(store.contains("stations"));

    let report = RuleEngine::new(StdRng::seed_from_u64(2), config.update_interval_secs())
        .tick(&mut store);
    assert_eq!(report.skipped(), 0);
}
