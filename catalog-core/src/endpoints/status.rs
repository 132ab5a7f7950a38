use axum::debug_handler;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::gateway_util::{AppState, AppStateData};

pub const CATALOG_GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A handler for a simple liveness check
#[debug_handler]
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: CATALOG_GATEWAY_VERSION.to_string(),
    })
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

/// A handler for a health check that includes availability of the category directory
pub async fn health_handler(
    State(AppStateData { aggregator, .. }): AppState,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match aggregator.directory().read_all().await {
        Ok(_) => Ok(Json(json!({
            "gateway": "ok",
            "directory": "ok",
        }))),
        Err(_) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "gateway": "ok",
                "directory": "error",
            })),
        )),
    }
}
