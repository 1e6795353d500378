//! Integration tests for registration, sign-in, and sign-out.

use reqwest::StatusCode;
use serde_json::{Value, json};

use atelier_integration_tests::{PASSWORD, TestApp, product};

#[tokio::test]
async fn test_register_me_logout() {
    let app = TestApp::spawn(Vec::new()).await;

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], false);

    app.register("lea@example.fr").await;
    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], true);
    assert_eq!(me["user"]["email"], "lea@example.fr");

    app.logout().await;
    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], false);
}

#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::spawn(Vec::new()).await;

    let resp = app
        .post(
            "/api/auth/register",
            &json!({ "email": "lea@example.fr", "password": PASSWORD, "password_confirm": "autre" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Passwords do not match");

    let resp = app
        .post(
            "/api/auth/register",
            &json!({ "email": "lea@example.fr", "password": "court", "password_confirm": "court" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.register("lea@example.fr").await;
    app.logout().await;
    let resp = app
        .post(
            "/api/auth/register",
            &json!({ "email": "lea@example.fr", "password": PASSWORD, "password_confirm": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::spawn(Vec::new()).await;
    app.register("lea@example.fr").await;
    app.logout().await;

    let resp = app
        .post(
            "/api/auth/login",
            &json!({ "email": "lea@example.fr", "password": "mauvais" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_sign_in_does_not_migrate_guest_cart() {
    let mug = product("Mug", "", 1200);
    let app = TestApp::spawn(vec![mug.clone()]).await;
    app.register("lea@example.fr").await;
    app.logout().await;

    app.add_to_cart(&mug, "invité").await;
    assert_eq!(app.cart().await["item_count"], 1);

    let resp = app.login("lea@example.fr").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let signed_in_cart = app.cart().await;
    assert_eq!(signed_in_cart["item_count"], 0);

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    let user_id = me["user"]["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.backend.cart_row_count(user_id).await, 0);

    // Guest lines are still in the guest slot
    app.logout().await;
    let guest_cart = app.cart().await;
    assert_eq!(guest_cart["item_count"], 1);
    assert_eq!(guest_cart["items"][0]["personalization"], "invité");
}

#[tokio::test]
async fn test_revoked_token_is_treated_as_guest() {
    let app = TestApp::spawn(Vec::new()).await;
    app.register("lea@example.fr").await;

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], true);
    let user_id = me["user"]["id"].as_str().unwrap().parse().unwrap();

    app.backend.revoke_tokens(user_id).await;

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], false);
    let resp = app.get("/api/checkout").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_access_token_is_renewed_transparently() {
    let mug = product("Mug", "", 1200);
    let app = TestApp::spawn(vec![mug.clone()]).await;
    app.register("lea@example.fr").await;
    app.add_to_cart(&mug, "Léa").await;

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    let user_id = me["user"]["id"].as_str().unwrap().parse().unwrap();

    app.backend.expire_access_tokens(user_id).await;

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], true);

    // The renewed tokens were stored: a second request must not need the
    // spent refresh token.
    let cart = app.cart().await;
    assert_eq!(cart["items"][0]["personalization"], "Léa");
    let resp = app.get("/api/checkout").await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_elsewhere_keeps_this_session() {
    let app = TestApp::spawn(Vec::new()).await;
    app.register("lea@example.fr").await;

    let other = app.other_visitor();
    let resp = other
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "lea@example.fr", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = other
        .post(app.url("/api/auth/logout"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let me: Value = app.get("/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["signed_in"], true);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = TestApp::spawn(Vec::new()).await;

    let mut statuses = Vec::new();
    for _ in 0..8 {
        let resp = app
            .post(
                "/api/auth/login",
                &json!({ "email": "lea@example.fr", "password": "mauvais" }),
            )
            .await;
        statuses.push(resp.status());
    }

    assert_eq!(statuses[0], StatusCode::UNAUTHORIZED);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_spoofed_forwarded_for_does_not_reset_login_limit() {
    let app = TestApp::spawn(Vec::new()).await;

    let mut statuses = Vec::new();
    for i in 0..8 {
        let resp = app
            .client
            .post(app.url("/api/auth/login"))
            .header("x-forwarded-for", format!("203.0.113.{i}"))
            .json(&json!({ "email": "lea@example.fr", "password": "mauvais" }))
            .send()
            .await
            .unwrap();
        statuses.push(resp.status());
    }

    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_register_and_login_share_one_limit() {
    let app = TestApp::spawn(Vec::new()).await;

    for i in 0..5 {
        let resp = app
            .post(
                "/api/auth/register",
                &json!({ "email": format!("client{i}@example.fr"), "password": "court", "password_confirm": "court" }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let resp = app.login("lea@example.fr").await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}
