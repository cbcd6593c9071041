//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`] with
//! CORS enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/updates` -- `WebSocket` `data_update` stream
/// - `GET /api/collections` -- collection names and kinds
/// - `GET /api/collections/{name}` -- one collection
/// - `GET /api/collections/{name}/{id}` -- one item
/// - `GET /api/collections/{name}/type/{type}` -- items of one type
/// - `GET /api/geojson/{name}` -- `FeatureCollection`
/// - `GET /api/schema` -- collection schema
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/updates", get(ws::ws_updates))
        // REST API
        .route("/api/collections", get(handlers::list_collections))
        .route("/api/collections/{name}", get(handlers::get_collection))
        .route("/api/collections/{name}/{id}", get(handlers::get_item))
        .route(
            "/api/collections/{name}/type/{type}",
            get(handlers::get_items_by_type),
        )
        .route("/api/geojson/{name}", get(handlers::get_geojson))
        .route("/api/schema", get(handlers::get_schema))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
