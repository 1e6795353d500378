//! Integration tests for the product gallery, detail, and search.

use reqwest::StatusCode;
use serde_json::Value;

use atelier_integration_tests::{TestApp, product};

#[tokio::test]
async fn test_gallery_lists_products_in_catalog_order() {
    let app = TestApp::spawn(vec![
        product("Bol", "Grès émaillé", 1800),
        product("Mug", "Tasse bleue", 1200),
    ])
    .await;

    let resp = app.get("/api/products").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let products: Value = resp.json().await.unwrap();

    assert_eq!(products[0]["name"], "Bol");
    assert_eq!(products[0]["price_display"], "18.00 €");
    assert_eq!(products[1]["name"], "Mug");
}

#[tokio::test]
async fn test_product_detail_and_unknown_ids() {
    let mug = product("Mug", "Tasse bleue", 1200);
    let app = TestApp::spawn(vec![mug.clone()]).await;

    let resp = app.get(&format!("/api/products/{}", mug.id)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["description"], "Tasse bleue");

    let resp = app.get("/api/products/not-a-uuid").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .get("/api/products/3f0f7a52-41c4-4c1e-9d59-0a0b1c2d3e4f")
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_is_case_insensitive_substring() {
    let app = TestApp::spawn(vec![
        product("Bol", "Grès émaillé", 1800),
        product("Mug", "Tasse bleue", 1200),
        product("Vase bleu", "Porcelaine", 3500),
    ])
    .await;

    let body: Value = app
        .get("/api/products/search?q=BLEU")
        .await
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = body["products"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Mug", "Vase bleu"]);

    let body: Value = app
        .get("/api/products/search?q=")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["products"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn(Vec::new()).await;

    let resp = app.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = app.get("/health/ready").await;
    assert_eq!(resp.status(), StatusCode::OK);
}
