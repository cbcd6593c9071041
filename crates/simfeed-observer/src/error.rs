//! Error types for the observer API server.
//!
//! [`ObserverError`] covers every failure a handler can return and converts
//! into a JSON `{error, status}` response through its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// No collection has this name.
    #[error("Collection '{name}' not found")]
    CollectionNotFound {
        /// The requested collection name.
        name: String,
    },

    /// The collection exists but holds no item with this id.
    #[error("Item with ID '{id}' not found")]
    ItemNotFound {
        /// The requested item id.
        id: String,
    },

    /// The collection holds no item of this type.
    #[error("No items of type '{item_type}' found")]
    NoItemsOfType {
        /// The requested type value.
        item_type: String,
    },

    /// The collection is missing or is not a geojson collection.
    #[error("GeoJSON collection '{name}' not found")]
    GeojsonNotFound {
        /// The requested collection name.
        name: String,
    },

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ObserverError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::CollectionNotFound { .. }
            | Self::ItemNotFound { .. }
            | Self::NoItemsOfType { .. }
            | Self::GeojsonNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
