use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use waymark_api::{build_app, AppConfig};

fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        jwt_secret: "test-secret".to_string(),
        token_ttl: Duration::from_secs(3600),
        allowed_origins: Vec::new(),
        maps_api_key: None,
        vertex: None,
        seed: true,
        login_attempt_window: Duration::from_secs(300),
        login_attempt_max: 10,
    }
}

async fn test_app() -> Router {
    build_app(test_config()).await.expect("app should build")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    request_json("POST", uri, token, body)
}

fn request_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            None,
            json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    body["token"].as_str().expect("login returns a token").to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["capabilities"]["trip_planning"], false);
}

#[tokio::test]
async fn register_then_login_round_trip() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            None,
            json!({
                "username": "dina",
                "email": "dina@example.com",
                "password": "hunter2hunter2"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        json_body(response).await["message"],
        "User registered successfully"
    );

    let token = login(&app, "dina", "hunter2hunter2").await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn register_rejects_duplicate_username() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            None,
            json!({
                "username": "raffa",
                "email": "other@example.com",
                "password": "whatever123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "Username already taken");
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/login",
            None,
            json!({ "username": "raffa", "password": "not-the-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid credentials");
}

#[tokio::test]
async fn seeded_catalog_is_publicly_readable() {
    let app = test_app().await;

    let response = app.clone().oneshot(get("/api/marker/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let categories = json_body(response).await;
    assert_eq!(categories.as_array().unwrap().len(), 6);

    let response = app.oneshot(get("/api/marker/tags")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tags = json_body(response).await;
    assert_eq!(tags.as_array().unwrap().len(), 8);
    assert!(tags
        .as_array()
        .unwrap()
        .iter()
        .any(|tag| tag["name"] == "Family-Friendly"));
}

#[tokio::test]
async fn marker_creation_requires_admin() {
    let app = test_app().await;
    let body = json!({
        "name": "Braga Street",
        "latitude": -6.9175,
        "longitude": 107.6098,
        "category_id": uuid::Uuid::new_v4(),
    });

    let response = app
        .clone()
        .oneshot(post_json("/api/markers", None, body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["error"],
        "Authorization token required"
    );

    let user_token = login(&app, "raffa", "userpassword").await;
    let response = app
        .oneshot(post_json("/api/markers", Some(&user_token), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

async fn first_category_id(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(get("/api/marker/categories"))
        .await
        .unwrap();
    let categories = json_body(response).await;
    categories[0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn admin_marker_crud_flow() {
    let app = test_app().await;
    let admin_token = login(&app, "superadmin", "adminpassword").await;
    let category_id = first_category_id(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/markers",
            Some(&admin_token),
            json!({
                "name": "Tangkuban Perahu",
                "description": "Volcano north of Bandung",
                "latitude": -6.7596,
                "longitude": 107.6098,
                "category_id": category_id,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let marker_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["view_count"], 0);

    let response = app
        .clone()
        .oneshot(request_json(
            "PUT",
            &format!("/api/markers/{marker_id}"),
            Some(&admin_token),
            json!({
                "name": "Gunung Tangkuban Perahu",
                "latitude": -6.7596,
                "longitude": 107.6098,
                "category_id": category_id,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["name"], "Gunung Tangkuban Perahu");

    // Reading the detail bumps the view counter.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/markers/{marker_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/markers/{marker_id}"))
                .header("authorization", format!("Bearer {admin_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/markers")).await.unwrap();
    let markers = json_body(response).await;
    assert!(markers.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn non_admin_cannot_update_someone_elses_marker() {
    let app = test_app().await;
    let admin_token = login(&app, "superadmin", "adminpassword").await;
    let user_token = login(&app, "raffa", "userpassword").await;
    let category_id = first_category_id(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/markers",
            Some(&admin_token),
            json!({
                "name": "Kota Tua",
                "latitude": -6.1352,
                "longitude": 106.8133,
                "category_id": category_id,
            }),
        ))
        .await
        .unwrap();
    let marker_id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(request_json(
            "PUT",
            &format!("/api/markers/{marker_id}"),
            Some(&user_token),
            json!({
                "name": "Renamed",
                "latitude": -6.1352,
                "longitude": 106.8133,
                "category_id": category_id,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await["error"],
        "Marker not found or you don't have permission to update it"
    );
}

#[tokio::test]
async fn reviews_validate_rating_and_update_aggregates() {
    let app = test_app().await;
    let admin_token = login(&app, "superadmin", "adminpassword").await;
    let user_token = login(&app, "raffa", "userpassword").await;
    let category_id = first_category_id(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/markers",
            Some(&admin_token),
            json!({
                "name": "Braga Street",
                "latitude": -6.9175,
                "longitude": 107.6098,
                "category_id": category_id,
            }),
        ))
        .await
        .unwrap();
    let marker_id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/markers/{marker_id}/reviews"),
            Some(&user_token),
            json!({ "rating": 6 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Rating must be between 1 and 5"
    );

    for rating in [5, 4] {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/markers/{marker_id}/reviews"),
                Some(&user_token),
                json!({ "rating": rating, "comment": "nice spot" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(get(&format!("/api/markers/{marker_id}")))
        .await
        .unwrap();
    let marker = json_body(response).await;
    assert_eq!(marker["total_reviews"], 2);
    assert!((marker["avg_rating"].as_f64().unwrap() - 4.5).abs() < 1e-9);

    let response = app
        .oneshot(get(&format!("/api/markers/{marker_id}/reviews")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn saved_routes_are_scoped_to_their_owner() {
    let app = test_app().await;
    let user_token = login(&app, "raffa", "userpassword").await;

    let route = json!({
        "distance_text": "148 km",
        "distance_meters": 147573,
        "duration_text": "2 hours 45 mins",
        "duration_seconds": 9882,
        "start_location": { "lat": -6.2383, "lng": 106.9756 },
        "end_location": { "lat": -6.9175, "lng": 107.6191 },
        "overview_polyline": "abc123"
    });

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/routes",
            Some(&user_token),
            json!({
                "name": "weekend loop",
                "origin_text": "Bekasi",
                "destination_text": "Bandung",
                "is_public": true,
                "route": route,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let saved = json_body(response).await;
    assert_eq!(saved["distance_meters"], 147573);
    assert_eq!(saved["destination_lat"], -6.9175);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/routes")
                .header("authorization", format!("Bearer {user_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    // Public listing needs no token.
    let response = app.clone().oneshot(get("/api/routes/public")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    // Listing without a token is rejected.
    let response = app.oneshot(get("/api/routes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plan_trip_requires_auth() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/plan-trip",
            None,
            json!({ "query": "Mau ke Bandung", "origin": "Bekasi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plan_trip_validates_body() {
    let app = test_app().await;
    let token = login(&app, "raffa", "userpassword").await;

    let response = app
        .oneshot(post_json(
            "/api/plan-trip",
            Some(&token),
            json!({ "query": "  ", "origin": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "query and origin are required"
    );
}

#[tokio::test]
async fn plan_trip_without_upstream_credentials_is_unavailable() {
    let app = test_app().await;
    let token = login(&app, "raffa", "userpassword").await;

    let response = app
        .oneshot(post_json(
            "/api/plan-trip",
            Some(&token),
            json!({ "query": "Mau ke Bandung", "origin": "Bekasi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Trip planning is not configured"
    );
}

#[tokio::test]
async fn expired_and_garbage_tokens_are_rejected() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/plan-trip",
            Some("not.a.token"),
            json!({ "query": "Mau ke Bandung", "origin": "Bekasi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["error"],
        "Invalid or expired token"
    );
}
