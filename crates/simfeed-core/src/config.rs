//! Configuration loading: global settings plus the initial store.
//!
//! A configuration document has two top-level keys:
//!
//! ```json
//! {
//!   "config": {"update_interval": 5},
//!   "collections": [
//!     {"name": "sensors", "kind": "standard", "items": [...]}
//!   ]
//! }
//! ```
//!
//! Files ending in `.yaml` or `.yml` are read as YAML, anything else as
//! JSON. Rules under each item's `update_rules` are decoded once here; the
//! engine never looks at the raw rule objects again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use simfeed_types::{CollectionKind, Rule};
use tracing::{info, warn};

use crate::clock::{UpdateClock, format_timestamp};
use crate::store::{Collection, FieldRule, Item, Store, UPDATE_RULES_KEY};

/// Seconds between ticks when the document does not say otherwise.
pub const DEFAULT_UPDATE_INTERVAL_SECS: f64 = 5.0;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse config JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// Two collection descriptors share a name.
    #[error("duplicate collection name `{name}`")]
    DuplicateCollection {
        /// The repeated name.
        name: String,
    },
}

/// Where a configuration document comes from.
#[derive(Debug, Clone, Copy)]
pub enum ConfigSource<'a> {
    /// A file; the extension picks the format.
    Path(&'a Path),
    /// An in-memory JSON document.
    Json(&'a str),
    /// An in-memory YAML document.
    Yaml(&'a str),
}

// ---------------------------------------------------------------------------
// Global settings
// ---------------------------------------------------------------------------

/// Settings under the document's `config` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GlobalConfig {
    /// Seconds between ticks.
    #[serde(default = "default_update_interval")]
    pub update_interval: f64,

    /// Seed for the engine's random draws; entropy from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Stop after this many ticks; 0 runs until stopped.
    #[serde(default)]
    pub max_ticks: u64,

    /// Query and push server binding.
    #[serde(default)]
    pub server: ServerSection,

    /// Broker publishing; disabled when absent.
    #[serde(default)]
    pub nats: Option<NatsSection>,
}

impl GlobalConfig {
    /// Seconds between ticks, falling back to the default when the
    /// configured value is not a positive finite number.
    pub fn update_interval_secs(&self) -> f64 {
        if self.update_interval.is_finite() && self.update_interval > 0.0 {
            self.update_interval
        } else {
            DEFAULT_UPDATE_INTERVAL_SECS
        }
    }

    /// The tick period.
    pub fn update_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.update_interval_secs())
            .unwrap_or(Duration::from_secs(5))
    }

    /// Apply environment variable overrides.
    ///
    /// - `SIMFEED_HOST` overrides `server.host`
    /// - `SIMFEED_PORT` overrides `server.port`
    /// - `NATS_URL` overrides `nats.url`, enabling publishing if needed
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SIMFEED_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SIMFEED_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!(value = %port, error = %e, "Ignoring invalid SIMFEED_PORT"),
            }
        }
        if let Some(url) = lookup("NATS_URL") {
            self.nats.get_or_insert_with(NatsSection::default).url = url;
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            seed: None,
            max_ticks: 0,
            server: ServerSection::default(),
            nats: None,
        }
    }
}

/// Address the query server listens on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// NATS broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NatsSection {
    /// Server URL.
    #[serde(default = "default_nats_url")]
    pub url: String,

    /// First token of every published subject.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

impl Default for NatsSection {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    config: GlobalConfig,
    #[serde(default)]
    collections: Vec<CollectionDescriptor>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescriptor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "type")]
    kind: CollectionKind,
    #[serde(default)]
    items: Vec<Value>,
}

/// Load a configuration document into a fresh store.
///
/// Every item is stamped with the load time. The returned [`GlobalConfig`]
/// holds exactly what the document says; callers that honor environment
/// variables apply [`GlobalConfig::apply_env_overrides`] themselves.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Json`] or [`ConfigError::Yaml`] when the document is
/// malformed, and [`ConfigError::DuplicateCollection`] when two collections
/// share a name.
pub fn load(source: ConfigSource<'_>) -> Result<(Store, GlobalConfig), ConfigError> {
    let document: ConfigDocument = match source {
        ConfigSource::Path(path) => {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if is_yaml(path) {
                serde_yml::from_str(&contents)?
            } else {
                serde_json::from_str(&contents)?
            }
        }
        ConfigSource::Json(text) => serde_json::from_str(text)?,
        ConfigSource::Yaml(text) => serde_yml::from_str(text)?,
    };

    let ConfigDocument {
        config,
        collections,
    } = document;

    let store = build_store(collections)?;
    info!(
        collections = store.len(),
        update_interval = config.update_interval_secs(),
        "Configuration loaded"
    );
    Ok((store, config))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

fn build_store(descriptors: Vec<CollectionDescriptor>) -> Result<Store, ConfigError> {
    let stamp = format_timestamp(UpdateClock::new().now());
    let mut store = Store::new();

    for (position, descriptor) in descriptors.into_iter().enumerate() {
        let Some(name) = descriptor.name.filter(|n| !n.is_empty()) else {
            warn!(position, "Skipping collection without a name");
            continue;
        };
        if store.contains(&name) {
            return Err(ConfigError::DuplicateCollection { name });
        }

        let kind = descriptor.kind;
        let mut items = Vec::with_capacity(descriptor.items.len());
        for (index, raw) in descriptor.items.into_iter().enumerate() {
            let Value::Object(fields) = raw else {
                warn!(collection = %name, index, "Skipping item that is not a mapping");
                continue;
            };
            let mut item = compile_item(&name, fields);
            item.touch(kind, &stamp);
            items.push(item);
        }

        info!(collection = %name, kind = kind.as_str(), items = items.len(), "Collection loaded");
        store.insert(name, Collection::new(kind, items));
    }

    Ok(store)
}

fn compile_item(collection: &str, fields: Map<String, Value>) -> Item {
    let rules = match fields.get(UPDATE_RULES_KEY) {
        Some(Value::Object(table)) => table
            .iter()
            .map(|(path, raw)| FieldRule {
                path: path.clone(),
                rule: compile_rule(collection, path, raw),
            })
            .collect(),
        Some(_) => {
            warn!(collection, "Ignoring update_rules that is not a mapping");
            Vec::new()
        }
        None => Vec::new(),
    };
    Item::new(fields, rules)
}

fn compile_rule(collection: &str, field: &str, raw: &Value) -> Rule {
    match Rule::decode(raw) {
        Ok(Rule::Unknown) => {
            let rule_type = raw.get("type").and_then(Value::as_str).unwrap_or("?");
            warn!(collection, field, rule_type, "Unknown rule type; field will not update");
            Rule::Unknown
        }
        Ok(rule) => rule,
        Err(e) => {
            warn!(collection, field, error = %e, "Undecodable rule; field will not update");
            Rule::Unknown
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_update_interval() -> f64 {
    DEFAULT_UPDATE_INTERVAL_SECS
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    5000
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_subject_prefix() -> String {
    "simfeed".to_owned()
}
