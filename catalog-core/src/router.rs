//! Route definitions for the catalog gateway.

use std::time::Duration;

use axum::Router;
use axum::http::header::{CONTENT_TYPE, HeaderName};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::endpoints;
use crate::gateway_util::AppStateData;
use crate::observability::RouterExt as _;

/// Builds the full router. `/metrics` is only mounted when a Prometheus recorder was installed.
pub fn build_router(app_state: AppStateData, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut router: Router<AppStateData> = Router::new()
        .route("/", get(endpoints::catalog::action_handler))
        .route("/status", get(endpoints::status::status_handler))
        .route("/health", get(endpoints::status::health_handler));

    if let Some(metrics_handle) = metrics_handle {
        router = router.route(
            "/metrics",
            get(move || std::future::ready(metrics_handle.render())),
        );
    }

    let mut router = router.fallback(endpoints::fallback::handle_404);
    if let Some(cors) = build_cors_layer(&app_state.config.gateway.cors) {
        router = router.layer(cors);
    }
    router.apply_http_trace_layer().with_state(app_state)
}

/// `None` when no origins are configured, so cross-origin requests get no CORS headers.
fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if cors.allowed_origins.is_empty() {
        return None;
    }
    let allow_origin = if cors.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        // Origins were checked by `Config::validate`
        AllowOrigin::list(
            cors.allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-requested-with")])
            .max_age(Duration::from_secs(60 * 60)),
    )
}
