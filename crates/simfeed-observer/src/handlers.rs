//! REST API endpoint handlers for the observer server.
//!
//! Every handler takes a read lock on the shared store, so responses always
//! reflect a completed tick.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/collections` | Collection names and kinds |
//! | `GET` | `/api/collections/{name}` | Every item of one collection |
//! | `GET` | `/api/collections/{name}/{id}` | One item by id |
//! | `GET` | `/api/collections/{name}/type/{type}` | Items of one type |
//! | `GET` | `/api/geojson/{name}` | A geojson collection as a `FeatureCollection` |
//! | `GET` | `/api/schema` | One sample item per collection, values replaced by type names |

use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use serde_json::{Map, Value, json};
use simfeed_types::CollectionKind;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the tick count, the collections, and
/// the API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store.read().await;
    let tick = store.tick();
    let collection_count = store.len();
    let item_count: usize = store.collections().map(|(_, c)| c.items.len()).sum();

    let mut rows = String::new();
    for (name, collection) in store.collections() {
        let name = escape_html(name);
        // Writing into a String cannot fail.
        let _ = writeln!(
            rows,
            r#"        <li><a href="/api/collections/{name}">/api/collections/{name}</a> -- {kind}, {count} items</li>"#,
            kind = collection.kind.as_str(),
            count = collection.items.len(),
        );
    }
    drop(store);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Simfeed Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Simfeed Observer</h1>
    <p class="subtitle">Live data simulator</p>

    <p>Status: <span class="status">RUNNING</span></p>

    <div>
        <div class="metric">
            <div class="label">Tick</div>
            <div class="value">{tick}</div>
        </div>
        <div class="metric">
            <div class="label">Collections</div>
            <div class="value">{collection_count}</div>
        </div>
        <div class="metric">
            <div class="label">Items</div>
            <div class="value">{item_count}</div>
        </div>
    </div>

    <hr>

    <h2>Collections</h2>
    <ul>
{rows}    </ul>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/collections">/api/collections</a> -- Collection names and kinds</li>
        <li>/api/collections/:name/:id -- Single item</li>
        <li>/api/collections/:name/type/:type -- Items of one type</li>
        <li>/api/geojson/:name -- GeoJSON FeatureCollection</li>
        <li><a href="/api/schema">/api/schema</a> -- Collection schema</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws/updates</code> -- Live data_update stream</li>
    </ul>
</body>
</html>"#
    ))
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

// ---------------------------------------------------------------------------
// GET /api/collections -- names and kinds
// ---------------------------------------------------------------------------

/// List every collection with its kind, keyed by name.
pub async fn list_collections(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store.read().await;
    let collections: Map<String, Value> = store
        .collections()
        .map(|(name, collection)| (name.to_owned(), json!({"type": collection.kind})))
        .collect();

    Json(json!({ "collections": collections }))
}

// ---------------------------------------------------------------------------
// GET /api/collections/{name} -- one collection
// ---------------------------------------------------------------------------

/// Return every item of one collection along with its kind.
pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let store = state.store.read().await;
    let collection = store
        .collection(&name)
        .ok_or(ObserverError::CollectionNotFound { name })?;

    Ok(Json(json!({
        "type": collection.kind,
        "items": serde_json::to_value(&collection.items)?,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/collections/{name}/{id} -- one item
// ---------------------------------------------------------------------------

/// Return the first item of a collection whose id matches.
///
/// Geojson features are matched on `id` or `properties.id`.
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    let store = state.store.read().await;
    let collection = store
        .collection(&name)
        .ok_or(ObserverError::CollectionNotFound { name })?;
    let item = collection
        .find_by_id(&id)
        .ok_or(ObserverError::ItemNotFound { id })?;

    Ok(Json(serde_json::to_value(item)?))
}

// ---------------------------------------------------------------------------
// GET /api/collections/{name}/type/{type} -- items by type
// ---------------------------------------------------------------------------

/// Return every item of the given type. An empty match is a 404.
pub async fn get_items_by_type(
    State(state): State<Arc<AppState>>,
    Path((name, item_type)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    let store = state.store.read().await;
    let collection = store
        .collection(&name)
        .ok_or(ObserverError::CollectionNotFound { name })?;
    let items = collection.find_by_type(&item_type);
    if items.is_empty() {
        return Err(ObserverError::NoItemsOfType { item_type });
    }

    Ok(Json(json!({ "items": serde_json::to_value(items)? })))
}

// ---------------------------------------------------------------------------
// GET /api/geojson/{name} -- FeatureCollection
// ---------------------------------------------------------------------------

/// Wrap a geojson collection's features in a `FeatureCollection`.
pub async fn get_geojson(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let store = state.store.read().await;
    let Some(collection) = store
        .collection(&name)
        .filter(|c| c.kind == CollectionKind::Geojson)
    else {
        return Err(ObserverError::GeojsonNotFound { name });
    };

    Ok(Json(json!({
        "type": "FeatureCollection",
        "features": serde_json::to_value(&collection.items)?,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/schema -- shape of each collection
// ---------------------------------------------------------------------------

/// Describe each collection by a sample of its first item.
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let store = state.store.read().await;
    let schema = store.schema();

    Ok(Json(json!({ "collections": serde_json::to_value(schema)? })))
}
