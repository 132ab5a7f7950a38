use std::sync::Arc;

use axum::debug_handler;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSnapshot;
use crate::error::Error;
use crate::gateway_util::{AppState, AppStateData};
use crate::invalidation::INVALIDATE_CACHE_ACTION;
use crate::version::VersionToken;

pub const GET_PUBLIC_CATALOG_ACTION: &str = "getPublicCatalog";
pub const GET_CACHE_VERSION_ACTION: &str = "getCacheVersion";
pub const GATEWAY_ACTIVE_MESSAGE: &str = "Catalog gateway is active";

#[derive(Debug, Default, Deserialize)]
pub struct ActionParams {
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCatalogResponse {
    pub success: bool,
    pub data: Arc<CatalogSnapshot>,
    pub cache_version: VersionToken,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheVersionResponse {
    pub success: bool,
    pub cache_version: VersionToken,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// A handler for the `?action=` routed surface. Unknown or missing actions get a liveness message.
#[debug_handler(state = AppStateData)]
pub async fn action_handler(
    State(app_state): AppState,
    Query(params): Query<ActionParams>,
) -> Result<Response, Error> {
    let response = match params.action.as_deref() {
        Some(GET_PUBLIC_CATALOG_ACTION) => get_public_catalog(&app_state).await?.into_response(),
        Some(INVALIDATE_CACHE_ACTION) => invalidate_cache(&app_state).await?.into_response(),
        Some(GET_CACHE_VERSION_ACTION) => get_cache_version(&app_state).await.into_response(),
        _ => Json(MessageResponse {
            success: true,
            message: GATEWAY_ACTIVE_MESSAGE.to_string(),
        })
        .into_response(),
    };
    Ok(response)
}

async fn get_public_catalog(
    app_state: &AppStateData,
) -> Result<Json<PublicCatalogResponse>, Error> {
    let data = app_state.aggregator.get_public_catalog().await?;
    let cache_version = app_state.aggregator.cache().version_or_initial().await;
    Ok(Json(PublicCatalogResponse {
        success: true,
        data,
        cache_version,
    }))
}

async fn invalidate_cache(app_state: &AppStateData) -> Result<Json<MessageResponse>, Error> {
    let token = app_state.aggregator.cache().invalidate().await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Catalog cache invalidated. New version: {token}"),
    }))
}

async fn get_cache_version(app_state: &AppStateData) -> Json<CacheVersionResponse> {
    let cache_version = app_state.aggregator.cache().version_or_initial().await;
    Json(CacheVersionResponse {
        success: true,
        cache_version,
    })
}
