#![expect(clippy::unwrap_used)]

mod common;

use common::{products, start_backend, start_gateway};
use reqwest::StatusCode;
use serde_json::Value;

async fn get_json(url: &str) -> (StatusCode, Value) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn two_category_config(a_url: &str, b_url: &str) -> String {
    format!(
        r#"
        [directory]
        type = "static"

        [[directory.categories]]
        id = "CAT-A"
        name = "Backend"
        endpoint = "{a_url}"

        [[directory.categories]]
        id = "CAT-B"
        name = "Frontend"
        endpoint = "{b_url}"

        [[directory.categories]]
        id = "CAT-C"
        name = "Not deployed yet"
        endpoint = "REMPLIR_URL_SCRIPT_BACKEND"
        "#
    )
}

#[tokio::test]
async fn test_public_catalog_over_http() {
    let a = start_backend(Some(products("A", 3))).await;
    let b = start_backend(None).await;
    let gateway = start_gateway(&two_category_config(&a.url, &b.url)).await;

    let (status, body) = get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cacheVersion"], "0");

    let categories = body["data"]["categories"].as_array().unwrap();
    let active: Vec<bool> = categories
        .iter()
        .map(|c| c["active"].as_bool().unwrap())
        .collect();
    assert_eq!(active, [true, true, false]);
    assert_eq!(categories[0]["backendEndpoint"], a.url);
    assert_eq!(
        categories[2]["backendEndpoint"],
        "REMPLIR_URL_SCRIPT_BACKEND"
    );

    let products = body["data"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 3);
    assert_eq!(products[0]["ID_Cours"], "A-0");
    assert_eq!(products[0]["category"], "Backend");
    assert_eq!(products[0]["categoryId"], "CAT-A");

    // Served from the cache
    get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    assert_eq!(a.hits(), 1);
    assert_eq!(b.hits(), 1);
}

#[tokio::test]
async fn test_invalidate_over_http() {
    let a = start_backend(Some(products("A", 1))).await;
    let b = start_backend(Some(products("B", 2))).await;
    let gateway = start_gateway(&two_category_config(&a.url, &b.url)).await;

    get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    let (status, body) = get_json(&format!("{gateway}/?action=invalidateCache")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, first) = get_json(&format!("{gateway}/?action=getCacheVersion")).await;
    get_json(&format!("{gateway}/?action=invalidateCache")).await;
    let (_, second) = get_json(&format!("{gateway}/?action=getCacheVersion")).await;
    let first: u64 = first["cacheVersion"].as_str().unwrap().parse().unwrap();
    let second: u64 = second["cacheVersion"].as_str().unwrap().parse().unwrap();
    assert!(second > first);

    let (_, body) = get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    assert_eq!(body["cacheVersion"], second.to_string());
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 3);
    assert_eq!(a.hits(), 2);
}

#[tokio::test]
async fn test_default_action_and_unknown_route() {
    let gateway = start_gateway("").await;

    let (status, body) = get_json(&format!("{gateway}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Catalog gateway is active");

    let (status, body) = get_json(&format!("{gateway}/catalog")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Route not found: GET /catalog");

    let (status, body) = get_json(&format!("{gateway}/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_empty_directory_makes_no_backend_calls() {
    let gateway = start_gateway(
        r#"
        [directory]
        type = "static"

        [[directory.categories]]
        id = "CAT-1"
        name = "Blank"
        endpoint = ""
        "#,
    )
    .await;
    let (status, body) = get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["categories"].as_array().unwrap().len(), 1);
    assert!(body["data"]["products"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_directory_file_yields_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("categories.tsv");
    let gateway = start_gateway(&format!(
        r#"
        [directory]
        type = "file"
        path = "{}"
        watch_interval_ms = 0
        "#,
        path.display()
    ))
    .await;

    let (status, body) = get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("unavailable"));

    let (status, _) = get_json(&format!("{gateway}/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // The store coming back is picked up by the next request
    std::fs::write(
        &path,
        "IDCategorie\tNomCategorie\tScriptURL\nCAT-1\tBackend\t\n",
    )
    .unwrap();
    let (status, body) = get_json(&format!("{gateway}/?action=getPublicCatalog")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["categories"][0]["id"], "CAT-1");
}

#[tokio::test]
async fn test_cors_preflight() {
    let gateway = start_gateway(
        r#"
        [gateway.cors]
        allowed_origins = ["https://shop.example"]
        "#,
    )
    .await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{gateway}/"))
        .header("Origin", "https://shop.example")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-requested-with")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "https://shop.example"
    );
    let methods = headers
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("GET"));
    assert!(methods.contains("OPTIONS"));
}
