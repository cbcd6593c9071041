//! Observer API server for the Simfeed data simulator.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/updates`) streaming one `data_update`
//!   message per tick via [`tokio::sync::broadcast`]
//! - **REST endpoints** for reading collections, single items, items by
//!   type, geojson `FeatureCollection`s, and the collection schema
//! - **Minimal HTML status page** (`GET /`) showing the tick count and
//!   links to the API
//!
//! # Architecture
//!
//! REST handlers take read locks on the live [`SharedStore`] that the
//! scheduler mutates once per tick, so every response reflects a whole
//! tick. [`AppState`] implements the scheduler's
//! [`Publisher`](simfeed_core::scheduler::Publisher) hook by broadcasting
//! each snapshot to `WebSocket` clients, with automatic lag handling.
//!
//! [`SharedStore`]: simfeed_core::store::SharedStore

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
