#![expect(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use catalog_core::config::Config;
use catalog_core::gateway_util::AppStateData;
use catalog_core::router::build_router;
use serde_json::{Value, json};

#[derive(Clone)]
struct BackendState {
    products: Option<Vec<Value>>,
    hits: Arc<AtomicUsize>,
}

/// A category backend listening on a random local port
pub struct TestBackend {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl TestBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn backend_handler(State(state): State<BackendState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match state.products {
        Some(products) => axum::Json(json!({ "success": true, "data": products })).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// `None` answers every request with HTTP 500
pub async fn start_backend(products: Option<Vec<Value>>) -> TestBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/exec", get(backend_handler))
        .with_state(BackendState {
            products,
            hits: hits.clone(),
        });
    let addr = serve(router).await;
    TestBackend {
        url: format!("http://{addr}/exec"),
        hits,
    }
}

pub fn products(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|n| json!({ "ID_Cours": format!("{prefix}-{n}"), "Titre": format!("Course {n}") }))
        .collect()
}

/// Serves the gateway router built from `config_str` and returns its base URL
pub async fn start_gateway(config_str: &str) -> String {
    let config = Config::load_from_toml(config_str).unwrap();
    let app_state = AppStateData::new(Arc::new(config)).unwrap();
    let addr = serve(build_router(app_state, None)).await;
    format!("http://{addr}")
}
