//! Helpers for unit tests: in-process category backends that count their hits.
#![expect(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::directory::CategoryRecord;

#[derive(Clone, Debug)]
pub enum MockResponse {
    /// `{success: true, data: [...]}`
    Products(Vec<Value>),
    /// An empty body with the given status
    Status(StatusCode),
    /// A 200 with an arbitrary raw body
    Raw(String),
    /// Like `Products`, after sleeping for the given duration
    Delayed(Duration, Vec<Value>),
}

#[derive(Clone)]
struct MockState {
    response: MockResponse,
    hits: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
}

pub struct MockBackend {
    pub url: String,
    hits: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn category(&self, id: &str, name: &str) -> CategoryRecord {
        CategoryRecord {
            id: id.to_string(),
            name: name.to_string(),
            endpoint: self.url.clone(),
            ..Default::default()
        }
        .resolve_active("REMPLIR_")
    }
}

async fn mock_handler(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .actions
        .lock()
        .unwrap()
        .push(params.get("action").cloned().unwrap_or_default());
    match state.response {
        MockResponse::Products(products) => {
            Json(json!({ "success": true, "data": products })).into_response()
        }
        MockResponse::Status(status) => status.into_response(),
        MockResponse::Raw(body) => body.into_response(),
        MockResponse::Delayed(delay, products) => {
            tokio::time::sleep(delay).await;
            Json(json!({ "success": true, "data": products })).into_response()
        }
    }
}

pub async fn spawn_mock_backend(response: MockResponse) -> MockBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let actions = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/exec", get(mock_handler))
        .with_state(MockState {
            response,
            hits: hits.clone(),
            actions: actions.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    MockBackend {
        url: format!("http://{address}/exec"),
        hits,
        actions,
    }
}

/// `count` products named `<prefix>-<n>`, in order
pub fn products(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|n| json!({ "ID_Cours": format!("{prefix}-{n}"), "Prix": 1000 * n }))
        .collect()
}
