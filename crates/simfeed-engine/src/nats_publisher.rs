//! NATS broker publisher.
//!
//! Each snapshot goes out on `{prefix}.snapshot`, and each item that has an
//! id also goes out on `{prefix}.{collection}.{type}.{id}`. Subscribers can
//! follow the whole store or narrow down with wildcards such as
//! `simfeed.sensors.temperature.*`.
//!
//! The tick loop only does a `try_send` into a bounded channel. A spawned
//! task owns the client and does the publishing.

use std::sync::Arc;

use serde_json::Value;
use simfeed_core::config::NatsSection;
use simfeed_core::scheduler::Publisher;
use simfeed_core::store::Snapshot;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppError;

/// Snapshots that may queue before new ones are dropped.
const QUEUE_CAPACITY: usize = 16;

/// Type token for items without a `type`.
const UNTYPED: &str = "untyped";

/// Forwards snapshots to a background NATS publishing task.
#[derive(Debug)]
pub struct NatsPublisher {
    tx: mpsc::Sender<Arc<Snapshot>>,
}

impl NatsPublisher {
    /// Connect to the broker and spawn the publishing task.
    ///
    /// The task ends once the publisher is dropped and the queue drains.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Nats`] if the connection cannot be established.
    pub async fn connect(section: &NatsSection) -> Result<(Self, JoinHandle<()>), AppError> {
        info!(url = %section.url, "connecting to NATS server");
        let client = async_nats::connect(section.url.as_str())
            .await
            .map_err(|e| AppError::Nats {
                message: format!("failed to connect to {}: {e}", section.url),
            })?;
        info!("NATS connection established");

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let task = tokio::spawn(forward(client, section.subject_prefix.clone(), rx));
        Ok((Self { tx }, task))
    }
}

impl Publisher for NatsPublisher {
    fn publish(&self, snapshot: Arc<Snapshot>) {
        match self.tx.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(snapshot)) => {
                warn!(tick = snapshot.tick, "NATS queue full, dropping snapshot");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("NATS publishing task has stopped");
            }
        }
    }
}

/// Drain the queue, publishing every message of every snapshot.
async fn forward(
    client: async_nats::Client,
    prefix: String,
    mut rx: mpsc::Receiver<Arc<Snapshot>>,
) {
    while let Some(snapshot) = rx.recv().await {
        let messages = match snapshot_messages(&prefix, &snapshot) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(tick = snapshot.tick, error = %e, "failed to serialize snapshot");
                continue;
            }
        };
        let count = messages.len();
        for (subject, payload) in messages {
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(subject = subject, error = %e, "failed to publish snapshot");
            }
        }
        debug!(tick = snapshot.tick, messages = count, "Snapshot published to NATS");
    }
    if let Err(e) = client.flush().await {
        warn!(error = %e, "NATS flush failed");
    }
}

/// Every `(subject, payload)` pair for one snapshot: the whole snapshot
/// first, then one message per item that has an id.
///
/// # Errors
///
/// Returns an error if any payload fails to serialize.
pub fn snapshot_messages(
    prefix: &str,
    snapshot: &Snapshot,
) -> Result<Vec<(String, Vec<u8>)>, serde_json::Error> {
    let mut messages = vec![(format!("{prefix}.snapshot"), serde_json::to_vec(snapshot)?)];
    for (name, collection) in &snapshot.collections {
        for item in &collection.items {
            let Some(id) = item.id(collection.kind).and_then(id_text) else {
                continue;
            };
            let item_type = item.item_type(collection.kind).unwrap_or(UNTYPED);
            let subject = format!(
                "{prefix}.{}.{}.{}",
                subject_token(name),
                subject_token(item_type),
                subject_token(&id)
            );
            messages.push((subject, serde_json::to_vec(item)?));
        }
    }
    Ok(messages)
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Make a string safe to use as one NATS subject token.
///
/// Separators, wildcards, and whitespace become `_`. An empty string becomes
/// `_` too.
pub fn subject_token(raw: &str) -> String {
    if raw.is_empty() {
        return String::from("_");
    }
    raw.chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use simfeed_core::config::{ConfigSource, load};

    use super::*;

    const DOC: &str = r#"{
        "collections": [
            {"name": "sensors", "items": [
                {"id": "temp-001", "type": "temperature", "value": 22.5},
                {"id": 42, "value": 1},
                {"type": "orphan", "value": 0}
            ]},
            {"name": "traffic", "kind": "geojson", "items": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                "properties": {"id": "bus 7", "type": "bus.express"}
            }]}
        ]
    }"#;

    fn subjects(prefix: &str) -> Vec<String> {
        let (store, _) = load(ConfigSource::Json(DOC)).unwrap();
        let snapshot = Snapshot::capture(&store);
        snapshot_messages(prefix, &snapshot)
            .unwrap()
            .into_iter()
            .map(|(subject, _)| subject)
            .collect()
    }

    #[test]
    fn snapshot_subject_comes_first() {
        assert_eq!(subjects("simfeed")[0], "simfeed.snapshot");
    }

    #[test]
    fn items_get_their_own_subjects() {
        let subjects = subjects("simfeed");
        assert_eq!(
            subjects[1..],
            [
                "simfeed.sensors.temperature.temp-001",
                "simfeed.sensors.untyped.42",
                "simfeed.traffic.bus_express.bus_7",
            ]
        );
    }

    #[test]
    fn item_payload_is_the_item() {
        let (store, _) = load(ConfigSource::Json(DOC)).unwrap();
        let snapshot = Snapshot::capture(&store);
        let messages = snapshot_messages("p", &snapshot).unwrap();
        let item: Value = serde_json::from_slice(&messages[1].1).unwrap();
        assert_eq!(item["value"], 22.5);

        let whole: Value = serde_json::from_slice(&messages[0].1).unwrap();
        assert_eq!(whole["collections"]["sensors"]["items"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn tokens_are_sanitized() {
        assert_eq!(subject_token("a.b*c>d e"), "a_b_c_d_e");
        assert_eq!(subject_token(""), "_");
        assert_eq!(subject_token("temp-001"), "temp-001");
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let publisher = NatsPublisher { tx };
        let snapshot = Arc::new(Snapshot::capture(&simfeed_core::store::Store::new()));

        publisher.publish(Arc::clone(&snapshot));
        publisher.publish(Arc::clone(&snapshot));

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
