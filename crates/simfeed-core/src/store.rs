//! In-memory collection store and snapshots.
//!
//! The [`Store`] maps collection names to [`Collection`]s. It is built once
//! by the config loader; afterwards ticks change field values inside items
//! but never add or remove collections or items.
//!
//! Readers outside the tick loop go through [`SharedStore`], an async
//! read-write lock. The scheduler holds the write half for a whole tick, so a
//! reader never observes a partially applied tick. Broadcast consumers get a
//! [`Snapshot`], an owned copy taken after the tick completes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use simfeed_types::{CollectionKind, Rule};
use tokio::sync::RwLock;

use crate::path::{self, PathError};

/// Item key holding the per-field rule table.
pub const UPDATE_RULES_KEY: &str = "update_rules";

/// Item key (or `properties` key, for geojson) rewritten on every tick.
pub const TIMESTAMP_KEY: &str = "last_updated";

/// The store shared between the scheduler and query readers.
pub type SharedStore = Arc<RwLock<Store>>;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A compiled rule bound to the field it drives.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Field name (standard) or dot path (geojson).
    pub path: String,
    /// Decoded rule.
    pub rule: Rule,
}

/// One record of a collection.
///
/// Serializes as its raw field mapping, `update_rules` included, so readers
/// see exactly what was configured plus the live values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Item {
    fields: Map<String, Value>,
    #[serde(skip)]
    rules: Vec<FieldRule>,
}

impl Item {
    /// Build an item from its fields and the rules compiled from them.
    pub const fn new(fields: Map<String, Value>, rules: Vec<FieldRule>) -> Self {
        Self { fields, rules }
    }

    /// The item's raw fields.
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Compiled rules in document order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Whether any rule drives this item.
    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Read a rule target. Standard collections address literal keys,
    /// geojson collections dot paths.
    pub fn read(&self, kind: CollectionKind, key: &str) -> Option<&Value> {
        if kind.uses_dot_paths() {
            path::get(&self.fields, key)
        } else {
            self.fields.get(key)
        }
    }

    /// Write a rule target, addressed the same way as [`Item::read`].
    pub fn write(&mut self, kind: CollectionKind, key: &str, value: Value) -> Result<(), PathError> {
        if kind.uses_dot_paths() {
            path::set(&mut self.fields, key, value)
        } else if key.is_empty() {
            Err(PathError::Empty)
        } else {
            self.fields.insert(key.to_owned(), value);
            Ok(())
        }
    }

    /// The `type` of the object that owns the addressed field: the parent
    /// container for a dot path, the item itself otherwise.
    pub fn owner_type(&self, kind: CollectionKind, key: &str) -> Option<&str> {
        let owner = match path::parent(key).filter(|_| kind.uses_dot_paths()) {
            Some(parent) => path::get(&self.fields, parent)?,
            None => return self.fields.get("type").and_then(Value::as_str),
        };
        owner.get("type").and_then(Value::as_str)
    }

    /// Stamp the update time: `properties.last_updated` for geojson items
    /// that have properties, the top-level `last_updated` otherwise.
    pub fn touch(&mut self, kind: CollectionKind, stamp: &str) {
        let stamp = Value::String(stamp.to_owned());
        if kind == CollectionKind::Geojson {
            if let Some(Value::Object(properties)) = self.fields.get_mut("properties") {
                properties.insert(TIMESTAMP_KEY.to_owned(), stamp);
                return;
            }
        }
        self.fields.insert(TIMESTAMP_KEY.to_owned(), stamp);
    }

    /// The current update timestamp, wherever [`Item::touch`] put it.
    pub fn last_updated(&self, kind: CollectionKind) -> Option<&str> {
        let nested = (kind == CollectionKind::Geojson)
            .then(|| path::get(&self.fields, "properties.last_updated"))
            .flatten();
        nested
            .or_else(|| self.fields.get(TIMESTAMP_KEY))
            .and_then(Value::as_str)
    }

    /// The item's `id`; geojson features fall back to `properties.id`.
    pub fn id(&self, kind: CollectionKind) -> Option<&Value> {
        self.fields.get("id").or_else(|| {
            (kind == CollectionKind::Geojson)
                .then(|| path::get(&self.fields, "properties.id"))
                .flatten()
        })
    }

    /// Whether the item's id equals `id`, comparing numbers by their
    /// decimal rendering.
    pub fn matches_id(&self, kind: CollectionKind, id: &str) -> bool {
        match self.id(kind) {
            Some(Value::String(s)) => s == id,
            Some(Value::Number(n)) => n.to_string() == id,
            _ => false,
        }
    }

    /// The item's category: `type` for standard items, `properties.type`
    /// for geojson features.
    pub fn item_type(&self, kind: CollectionKind) -> Option<&str> {
        let raw = if kind == CollectionKind::Geojson {
            path::get(&self.fields, "properties.type")
        } else {
            self.fields.get("type")
        };
        raw.and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// A named, ordered group of items sharing an addressing kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Collection {
    /// How rule keys are interpreted.
    pub kind: CollectionKind,
    /// Items in configuration order.
    pub items: Vec<Item>,
}

impl Collection {
    /// Create a collection.
    pub const fn new(kind: CollectionKind, items: Vec<Item>) -> Self {
        Self { kind, items }
    }

    /// The first item whose id matches.
    pub fn find_by_id(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.matches_id(self.kind, id))
    }

    /// Every item of the given type, in collection order.
    pub fn find_by_type(&self, item_type: &str) -> Vec<&Item> {
        self.items
            .iter()
            .filter(|item| item.item_type(self.kind) == Some(item_type))
            .collect()
    }

    /// Describe the first item's shape, with every value replaced by its
    /// JSON type name. Geojson samples keep the Feature layout.
    pub fn schema_sample(&self) -> Option<Value> {
        let first = self.items.first()?;
        let sample = match self.kind {
            CollectionKind::Standard => Value::Object(describe_fields(first.fields())),
            CollectionKind::Geojson => {
                let geometry_type = path::get(first.fields(), "geometry.type")
                    .cloned()
                    .unwrap_or(Value::Null);
                let properties = match first.fields().get("properties") {
                    Some(Value::Object(props)) => describe_fields(props),
                    _ => Map::new(),
                };
                serde_json::json!({
                    "type": "Feature",
                    "geometry": {"type": geometry_type, "coordinates": "..."},
                    "properties": properties,
                })
            }
        };
        Some(sample)
    }
}

fn describe_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(key, _)| key.as_str() != UPDATE_RULES_KEY)
        .map(|(key, value)| (key.clone(), Value::String(json_type_name(value).to_owned())))
        .collect()
}

/// JSON type name of a value, distinguishing integers from other numbers.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Schema description of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Addressing kind.
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    /// Zero or one sample item.
    pub items: Vec<Value>,
}

/// Every collection, keyed by name, plus the number of completed ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    collections: BTreeMap<String, Collection>,
    tick: u64,
}

impl Store {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            collections: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Add a collection, returning any previous one under the same name.
    pub fn insert(&mut self, name: impl Into<String>, collection: Collection) -> Option<Collection> {
        self.collections.insert(name.into(), collection)
    }

    /// Whether a collection with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Look up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Collections in name order.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &Collection)> {
        self.collections.iter().map(|(name, c)| (name.as_str(), c))
    }

    /// Mutable access for the rule engine.
    pub(crate) fn collections_mut(&mut self) -> impl Iterator<Item = (&str, &mut Collection)> {
        self.collections.iter_mut().map(|(name, c)| (name.as_str(), c))
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether the store holds no collections.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Number of completed ticks.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Count one more completed tick and return the new count.
    pub(crate) const fn advance_tick(&mut self) -> u64 {
        self.tick = self.tick.saturating_add(1);
        self.tick
    }

    /// One schema entry per collection.
    pub fn schema(&self) -> Vec<CollectionSchema> {
        self.collections
            .iter()
            .map(|(name, collection)| CollectionSchema {
                name: name.clone(),
                kind: collection.kind,
                items: collection.schema_sample().into_iter().collect(),
            })
            .collect()
    }

    /// Wrap the store for sharing with readers.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable copy of the store taken after a tick.
///
/// Serializes as `{tick, taken_at, collections: {name: {kind, items}}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Number of ticks completed when the copy was taken.
    pub tick: u64,
    /// When the copy was taken.
    pub taken_at: DateTime<Utc>,
    /// Deep copy of every collection.
    pub collections: BTreeMap<String, Collection>,
}

impl Snapshot {
    /// Deep-copy the store.
    pub fn capture(store: &Store) -> Self {
        Self {
            tick: store.tick,
            taken_at: Utc::now(),
            collections: store.collections.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn sensor(id: &str, kind: &str, value: f64) -> Item {
        Item::new(
            fields(json!({"id": id, "type": kind, "value": value, "update_rules": {}})),
            Vec::new(),
        )
    }

    fn vehicle(id: &str, kind: &str) -> Item {
        Item::new(
            fields(json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [10.0, 20.0]},
                "properties": {"id": id, "type": kind, "speed": 12.0}
            })),
            Vec::new(),
        )
    }

    #[test]
    fn standard_keys_are_literal() {
        let mut item = Item::new(fields(json!({"a.b": 1, "a": {"b": 2}})), Vec::new());
        assert_eq!(item.read(CollectionKind::Standard, "a.b"), Some(&json!(1)));
        assert_eq!(item.read(CollectionKind::Geojson, "a.b"), Some(&json!(2)));
        item.write(CollectionKind::Standard, "a.b", json!(5)).unwrap();
        assert_eq!(item.fields()["a.b"], json!(5));
        assert_eq!(item.fields()["a"], json!({"b": 2}));
    }

    #[test]
    fn owner_type_follows_parent_container() {
        let item = vehicle("v-1", "bus");
        assert_eq!(
            item.owner_type(CollectionKind::Geojson, "geometry.coordinates"),
            Some("Point")
        );
        assert_eq!(
            item.owner_type(CollectionKind::Geojson, "properties.speed"),
            Some("bus")
        );
        assert_eq!(item.owner_type(CollectionKind::Geojson, "missing.field"), None);
        assert_eq!(
            item.owner_type(CollectionKind::Standard, "coordinates"),
            Some("Feature")
        );
    }

    #[test]
    fn touch_places_timestamp_by_kind() {
        let mut feature = vehicle("v-1", "bus");
        feature.touch(CollectionKind::Geojson, "2024-01-01T00:00:00Z");
        assert_eq!(
            feature.fields()["properties"]["last_updated"],
            "2024-01-01T00:00:00Z"
        );
        assert!(!feature.fields().contains_key("last_updated"));
        assert_eq!(
            feature.last_updated(CollectionKind::Geojson),
            Some("2024-01-01T00:00:00Z")
        );

        let mut bare = Item::new(fields(json!({"type": "Feature"})), Vec::new());
        bare.touch(CollectionKind::Geojson, "t");
        assert_eq!(bare.fields()["last_updated"], "t");

        let mut flat = sensor("temp-001", "temperature", 22.5);
        flat.touch(CollectionKind::Standard, "t");
        assert_eq!(flat.last_updated(CollectionKind::Standard), Some("t"));
    }

    #[test]
    fn finds_items_by_id_and_type() {
        let sensors = Collection::new(
            CollectionKind::Standard,
            vec![
                sensor("temp-001", "temperature", 22.5),
                sensor("temp-002", "temperature", 19.0),
                sensor("hum-001", "humidity", 45.0),
            ],
        );
        assert!(sensors.find_by_id("hum-001").is_some());
        assert!(sensors.find_by_id("nope").is_none());
        assert_eq!(sensors.find_by_type("temperature").len(), 2);
        assert!(sensors.find_by_type("pressure").is_empty());

        let traffic = Collection::new(CollectionKind::Geojson, vec![vehicle("v-1", "bus")]);
        assert!(traffic.find_by_id("v-1").is_some());
        assert_eq!(traffic.find_by_type("bus").len(), 1);
        assert!(traffic.find_by_type("Feature").is_empty());
    }

    #[test]
    fn numeric_ids_match_their_rendering() {
        let item = Item::new(fields(json!({"id": 42})), Vec::new());
        assert!(item.matches_id(CollectionKind::Standard, "42"));
        assert!(!item.matches_id(CollectionKind::Standard, "42.0"));
    }

    #[test]
    fn schema_describes_first_item() {
        let mut store = Store::new();
        store.insert(
            "sensors",
            Collection::new(
                CollectionKind::Standard,
                vec![sensor("temp-001", "temperature", 22.5)],
            ),
        );
        store.insert(
            "traffic",
            Collection::new(CollectionKind::Geojson, vec![vehicle("v-1", "bus")]),
        );
        store.insert("empty", Collection::default());

        let schema = store.schema();
        assert_eq!(schema.len(), 3);
        let empty = schema.iter().find(|s| s.name == "empty").unwrap();
        assert!(empty.items.is_empty());

        let sensors = schema.iter().find(|s| s.name == "sensors").unwrap();
        assert_eq!(
            sensors.items[0],
            json!({"id": "string", "type": "string", "value": "number"})
        );

        let traffic = schema.iter().find(|s| s.name == "traffic").unwrap();
        assert_eq!(traffic.items[0]["geometry"]["type"], "Point");
        assert_eq!(traffic.items[0]["properties"]["speed"], "number");
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let mut store = Store::new();
        store.insert(
            "sensors",
            Collection::new(
                CollectionKind::Standard,
                vec![sensor("temp-001", "temperature", 22.5)],
            ),
        );
        store.advance_tick();
        let snapshot = Snapshot::capture(&store);

        for (_, collection) in store.collections_mut() {
            for item in &mut collection.items {
                item.write(CollectionKind::Standard, "value", json!(0.0)).unwrap();
            }
        }

        assert_eq!(snapshot.tick, 1);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["collections"]["sensors"]["kind"], "standard");
        assert_eq!(json["collections"]["sensors"]["items"][0]["value"], 22.5);
        assert!(json["taken_at"].is_string());
    }
}
