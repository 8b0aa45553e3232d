mod auth;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{body::Body, Router};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;
use waymark_core::{
    ActivityLog, Marker, MarkerCategory, MarkerImage, MarkerReview, MarkerTag, SavedRoute,
    TripQuery, User, ROLE_USER,
};
use waymark_observability::AppMetrics;
use waymark_planner::{PlanError, TripPlanner};
use waymark_storage::{
    seed, ActivityRepository, CatalogRepository, RouteRepository, Store, UserRepository,
};
use waymark_upstream::{
    GoogleDirectionsClient, GooglePlacesClient, VertexConfig, VertexIntentExtractor,
};

pub use crate::auth::{AdminUser, AuthUser, Claims, FailedLoginLimiter, TokenKeys};

const MAX_NAME_LEN: usize = 160;
const MAX_DESCRIPTION_LEN: usize = 2_000;
const MIN_RATING: i32 = 1;
const MAX_RATING: i32 = 5;

pub type LivePlanner =
    TripPlanner<VertexIntentExtractor, GoogleDirectionsClient, GooglePlacesClient>;

/// Everything read from the environment up front so a bad deployment fails at
/// startup, not on the first request. The planner credentials are optional;
/// without them the service still serves the catalog and auth surface.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub allowed_origins: Vec<String>,
    pub maps_api_key: Option<String>,
    pub vertex: Option<VertexConfig>,
    pub seed: bool,
    pub login_attempt_window: Duration,
    pub login_attempt_max: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let vertex = match (
            env::var("WAYMARK_VERTEX_PROJECT_ID").ok(),
            env::var("WAYMARK_VERTEX_ACCESS_TOKEN").ok(),
        ) {
            (Some(project_id), Some(access_token)) => Some(VertexConfig {
                project_id,
                location: env::var("WAYMARK_VERTEX_LOCATION")
                    .unwrap_or_else(|_| "us-central1".to_string()),
                access_token,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("WAYMARK_DATABASE_URL").ok(),
            jwt_secret: env::var("WAYMARK_JWT_SECRET")
                .unwrap_or_else(|_| "dev-waymark-secret".to_string()),
            token_ttl: Duration::from_secs(
                env::var("WAYMARK_TOKEN_TTL_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60 * 60 * 24),
            ),
            allowed_origins: env::var("WAYMARK_ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            maps_api_key: env::var("WAYMARK_MAPS_API_KEY").ok(),
            vertex,
            seed: env::var("WAYMARK_SEED")
                .map(|value| value != "0" && value.to_lowercase() != "false")
                .unwrap_or(true),
            login_attempt_window: Duration::from_secs(
                env::var("WAYMARK_LOGIN_RATE_LIMIT_WINDOW_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(300),
            ),
            login_attempt_max: env::var("WAYMARK_LOGIN_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(10),
        })
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub metrics: Arc<AppMetrics>,
    pub token_keys: TokenKeys,
    pub planner: Option<Arc<LivePlanner>>,
    pub login_limiter: FailedLoginLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

pub async fn build_app(config: AppConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();

    let store = match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };
    if config.seed {
        seed::run_all(&store).await?;
    }
    let store = Arc::new(store);

    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(20))
        .build()
        .context("failed to build HTTP client")?;

    let planner = match (config.maps_api_key.clone(), config.vertex.clone()) {
        (Some(maps_api_key), Some(vertex)) => {
            let extractor = VertexIntentExtractor::new(http_client.clone(), vertex)
                .context("invalid vertex configuration")?;
            Some(Arc::new(TripPlanner::new(
                extractor,
                GoogleDirectionsClient::new(http_client.clone(), maps_api_key.clone()),
                GooglePlacesClient::new(http_client, maps_api_key),
                metrics.clone(),
            )))
        }
        _ => {
            warn!("maps or vertex credentials absent, trip planning disabled");
            None
        }
    };

    let state = ApiState {
        store,
        metrics,
        token_keys: TokenKeys::new(config.jwt_secret, config.token_ttl),
        planner,
        login_limiter: FailedLoginLimiter::new(
            config.login_attempt_window,
            config.login_attempt_max,
        ),
        allowed_origins: Arc::new(config.allowed_origins),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/markers", get(list_markers).post(create_marker))
        .route(
            "/api/markers/{id}",
            get(get_marker).put(update_marker).delete(delete_marker),
        )
        .route(
            "/api/markers/{id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route(
            "/api/marker/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/marker/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/api/marker/tags", get(list_tags).post(create_tag))
        .route(
            "/api/marker/tags/{id}",
            put(update_tag).delete(delete_tag),
        )
        .route("/api/routes", get(list_my_routes).post(save_route))
        .route("/api/routes/public", get(list_public_routes))
        .route("/api/plan-trip", post(plan_trip))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn track_requests(State(state): State<ApiState>, request: Request<Body>, next: Next) -> Response {
    state.metrics.inc_request();
    next.run(request).await
}

fn internal_error(error: anyhow::Error) -> Response {
    warn!(error = %error, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn record_activity(state: &ApiState, user_id: Uuid, activity: &str, target: Option<Uuid>) {
    let entry = ActivityLog::record(user_id, activity, target);
    if let Err(error) = state.store.record_activity(&entry).await {
        warn!(error = %error, activity, "failed to record activity");
    }
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp_utc": Utc::now().to_rfc3339(),
            "metrics": state.metrics.snapshot(),
            "capabilities": {
                "trip_planning": state.planner.is_some(),
                "persistent_storage": matches!(state.store.as_ref(), Store::Sqlite(_)),
            },
        })),
    )
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    whatsapp: Option<String>,
}

async fn register(
    State(state): State<ApiState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let username = body.username.trim();
    let email = body.email.trim();
    if username.is_empty() || email.is_empty() || body.password.is_empty() {
        return bad_request("username, email and password are required");
    }
    if username.len() > MAX_NAME_LEN || email.len() > MAX_NAME_LEN {
        return bad_request("username or email is too long");
    }

    match state.store.find_user_by_username(username).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Username already taken" })),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(error) => return internal_error(error),
    }
    match state.store.find_user_by_email(email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Email already registered" })),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(error) => return internal_error(error),
    }

    let password_hash = match bcrypt::hash(&body.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(error) => return internal_error(error.into()),
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash,
        // Self-service registration never grants elevated roles; admins come
        // from seeding or manual promotion.
        role: ROLE_USER.to_string(),
        whatsapp: body
            .whatsapp
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        last_active_at: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    if let Err(error) = state.store.create_user(&user).await {
        return internal_error(error);
    }
    record_activity(&state, user.id, "register", None).await;

    (
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(State(state): State<ApiState>, Json(body): Json<LoginRequest>) -> Response {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return bad_request("username and password are required");
    }

    if !state.login_limiter.allow(username) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many login attempts" })),
        )
            .into_response();
    }

    let user = match state.store.find_user_by_username(username).await {
        Ok(user) => user,
        Err(error) => return internal_error(error),
    };

    let invalid = || {
        state.login_limiter.record_failure(username);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response()
    };

    let Some(user) = user else {
        return invalid();
    };
    match bcrypt::verify(&body.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return invalid(),
        Err(error) => return internal_error(error.into()),
    }

    let token = match state.token_keys.issue(user.id, &user.username, &user.role) {
        Ok(token) => token,
        Err(error) => return internal_error(error),
    };

    state.login_limiter.clear(username);
    if let Err(error) = state.store.touch_last_active(user.id, Utc::now()).await {
        warn!(error = %error, "failed to update last_active_at");
    }
    record_activity(&state, user.id, "login", None).await;

    (
        StatusCode::OK,
        Json(json!({
            "token": token,
            "user": {
                "id": user.id,
                "username": user.username,
                "role": user.role,
            },
        })),
    )
        .into_response()
}

async fn list_markers(State(state): State<ApiState>) -> Response {
    match state.store.list_markers().await {
        Ok(markers) => (StatusCode::OK, Json(markers)).into_response(),
        Err(error) => internal_error(error),
    }
}

async fn get_marker(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.store.find_marker(id).await {
        Ok(Some(marker)) => {
            if let Err(error) = state.store.increment_view_count(id).await {
                warn!(error = %error, "failed to bump view count");
            }
            (StatusCode::OK, Json(marker)).into_response()
        }
        Ok(None) => not_found("Marker not found"),
        Err(error) => internal_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct MarkerImageUpload {
    image_url: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarkerUpsertRequest {
    name: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    category_id: Uuid,
    #[serde(default)]
    tag_ids: Vec<Uuid>,
    #[serde(default)]
    images: Vec<MarkerImageUpload>,
}

fn validate_marker_body(body: &MarkerUpsertRequest) -> Result<(), Response> {
    if body.name.trim().is_empty() {
        return Err(bad_request("name is required"));
    }
    if body.name.len() > MAX_NAME_LEN {
        return Err(bad_request("name is too long"));
    }
    if body
        .description
        .as_deref()
        .is_some_and(|value| value.len() > MAX_DESCRIPTION_LEN)
    {
        return Err(bad_request("description is too long"));
    }
    if !(-90.0..=90.0).contains(&body.latitude) || !(-180.0..=180.0).contains(&body.longitude) {
        return Err(bad_request("latitude and longitude must be valid coordinates"));
    }
    Ok(())
}

async fn create_marker(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Json(body): Json<MarkerUpsertRequest>,
) -> Response {
    if let Err(response) = validate_marker_body(&body) {
        return response;
    }
    match state.store.find_category(body.category_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request("Category not found"),
        Err(error) => return internal_error(error),
    }

    let now = Utc::now();
    let marker = Marker {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        description: body.description.clone(),
        latitude: body.latitude,
        longitude: body.longitude,
        category_id: body.category_id,
        avg_rating: 0.0,
        total_reviews: 0,
        view_count: 0,
        added_by_user_id: claims.sub,
        created_at: now,
        updated_at: now,
        deleted_at: None,
        tags: Vec::new(),
        images: Vec::new(),
    };

    if let Err(error) = state.store.create_marker(&marker).await {
        return internal_error(error);
    }
    if let Err(error) = state.store.set_marker_tags(marker.id, &body.tag_ids).await {
        return internal_error(error);
    }
    for upload in &body.images {
        let image = MarkerImage {
            id: Uuid::new_v4(),
            marker_id: marker.id,
            image_url: upload.image_url.clone(),
            description: upload.description.clone(),
            uploaded_at: now,
            deleted_at: None,
        };
        if let Err(error) = state.store.add_marker_image(&image).await {
            return internal_error(error);
        }
    }
    record_activity(&state, claims.sub, "create_marker", Some(marker.id)).await;

    match state.store.find_marker(marker.id).await {
        Ok(Some(created)) => (StatusCode::CREATED, Json(created)).into_response(),
        Ok(None) => internal_error(anyhow::anyhow!("marker vanished after insert")),
        Err(error) => internal_error(error),
    }
}

async fn update_marker(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MarkerUpsertRequest>,
) -> Response {
    if let Err(response) = validate_marker_body(&body) {
        return response;
    }

    let existing = match state.store.find_marker(id).await {
        Ok(existing) => existing,
        Err(error) => return internal_error(error),
    };
    // Non-admins may only touch markers they added; the denial is shaped like
    // a missing marker so the endpoint does not leak which ids exist.
    let allowed = existing.as_ref().is_some_and(|marker| {
        claims.role == waymark_core::ROLE_ADMIN || marker.added_by_user_id == claims.sub
    });
    let Some(existing) = existing.filter(|_| allowed) else {
        return not_found("Marker not found or you don't have permission to update it");
    };

    match state.store.find_category(body.category_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request("Category not found"),
        Err(error) => return internal_error(error),
    }

    let updated = Marker {
        name: body.name.trim().to_string(),
        description: body.description.clone(),
        latitude: body.latitude,
        longitude: body.longitude,
        category_id: body.category_id,
        updated_at: Utc::now(),
        ..existing
    };

    if let Err(error) = state.store.update_marker(&updated).await {
        return internal_error(error);
    }
    if let Err(error) = state.store.set_marker_tags(id, &body.tag_ids).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "update_marker", Some(id)).await;

    match state.store.find_marker(id).await {
        Ok(Some(marker)) => (StatusCode::OK, Json(marker)).into_response(),
        Ok(None) => not_found("Marker not found"),
        Err(error) => internal_error(error),
    }
}

async fn delete_marker(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
) -> Response {
    match state.store.soft_delete_marker(id, Utc::now()).await {
        Ok(true) => {
            record_activity(&state, claims.sub, "delete_marker", Some(id)).await;
            (
                StatusCode::OK,
                Json(json!({ "message": "Marker deleted successfully" })),
            )
                .into_response()
        }
        Ok(false) => not_found("Marker not found"),
        Err(error) => internal_error(error),
    }
}

async fn list_reviews(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.store.find_marker(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Marker not found"),
        Err(error) => return internal_error(error),
    }
    match state.store.list_reviews(id).await {
        Ok(reviews) => (StatusCode::OK, Json(reviews)).into_response(),
        Err(error) => internal_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    rating: i32,
    comment: Option<String>,
}

async fn create_review(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Response {
    if !(MIN_RATING..=MAX_RATING).contains(&body.rating) {
        return bad_request("Rating must be between 1 and 5");
    }
    match state.store.find_marker(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Marker not found"),
        Err(error) => return internal_error(error),
    }

    let now = Utc::now();
    let review = MarkerReview {
        id: Uuid::new_v4(),
        marker_id: id,
        user_id: claims.sub,
        rating: body.rating,
        comment: body
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    if let Err(error) = state.store.add_review(&review).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "review_marker", Some(id)).await;

    (StatusCode::CREATED, Json(review)).into_response()
}

async fn list_categories(State(state): State<ApiState>) -> Response {
    match state.store.list_categories().await {
        Ok(categories) => (StatusCode::OK, Json(categories)).into_response(),
        Err(error) => internal_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct CategoryRequest {
    name: String,
    description: Option<String>,
}

async fn create_category(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Json(body): Json<CategoryRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return bad_request("name is required");
    }

    let now = Utc::now();
    let category = MarkerCategory {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        description: body.description.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    if let Err(error) = state.store.create_category(&category).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "create_category", Some(category.id)).await;

    (StatusCode::CREATED, Json(category)).into_response()
}

async fn update_category(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CategoryRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return bad_request("name is required");
    }

    let existing = match state.store.find_category(id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return not_found("Category not found"),
        Err(error) => return internal_error(error),
    };

    let updated = MarkerCategory {
        name: body.name.trim().to_string(),
        description: body.description.clone(),
        updated_at: Utc::now(),
        ..existing
    };

    if let Err(error) = state.store.update_category(&updated).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "update_category", Some(id)).await;

    (StatusCode::OK, Json(updated)).into_response()
}

async fn delete_category(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
) -> Response {
    match state.store.soft_delete_category(id, Utc::now()).await {
        Ok(true) => {
            record_activity(&state, claims.sub, "delete_category", Some(id)).await;
            (
                StatusCode::OK,
                Json(json!({ "message": "Category deleted successfully" })),
            )
                .into_response()
        }
        Ok(false) => not_found("Category not found"),
        Err(error) => internal_error(error),
    }
}

async fn list_tags(State(state): State<ApiState>) -> Response {
    match state.store.list_tags().await {
        Ok(tags) => (StatusCode::OK, Json(tags)).into_response(),
        Err(error) => internal_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct TagRequest {
    name: String,
}

async fn create_tag(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Json(body): Json<TagRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return bad_request("name is required");
    }

    let now = Utc::now();
    let tag = MarkerTag {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    if let Err(error) = state.store.create_tag(&tag).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "create_tag", Some(tag.id)).await;

    (StatusCode::CREATED, Json(tag)).into_response()
}

async fn update_tag(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TagRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return bad_request("name is required");
    }

    let existing = match state.store.find_tag(id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return not_found("Tag not found"),
        Err(error) => return internal_error(error),
    };

    let updated = MarkerTag {
        name: body.name.trim().to_string(),
        updated_at: Utc::now(),
        ..existing
    };

    if let Err(error) = state.store.update_tag(&updated).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "update_tag", Some(id)).await;

    (StatusCode::OK, Json(updated)).into_response()
}

async fn delete_tag(
    State(state): State<ApiState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
) -> Response {
    match state.store.soft_delete_tag(id, Utc::now()).await {
        Ok(true) => {
            record_activity(&state, claims.sub, "delete_tag", Some(id)).await;
            (
                StatusCode::OK,
                Json(json!({ "message": "Tag deleted successfully" })),
            )
                .into_response()
        }
        Ok(false) => not_found("Tag not found"),
        Err(error) => internal_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct SaveRouteRequest {
    name: String,
    origin_text: String,
    destination_text: String,
    #[serde(default)]
    is_public: bool,
    route: waymark_core::RouteSummary,
}

async fn save_route(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Json(body): Json<SaveRouteRequest>,
) -> Response {
    if body.name.trim().is_empty()
        || body.origin_text.trim().is_empty()
        || body.destination_text.trim().is_empty()
    {
        return bad_request("name, origin_text and destination_text are required");
    }

    let route_data = match serde_json::to_value(&body.route) {
        Ok(value) => value,
        Err(error) => return internal_error(error.into()),
    };

    let now = Utc::now();
    let route = SavedRoute {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        origin_text: body.origin_text.trim().to_string(),
        destination_text: body.destination_text.trim().to_string(),
        origin_lat: body.route.start_location.lat,
        origin_lng: body.route.start_location.lng,
        destination_lat: body.route.end_location.lat,
        destination_lng: body.route.end_location.lng,
        route_data,
        distance_meters: body.route.distance_meters,
        duration_seconds: body.route.duration_seconds,
        user_id: claims.sub,
        is_public: body.is_public,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    if let Err(error) = state.store.save_route(&route).await {
        return internal_error(error);
    }
    record_activity(&state, claims.sub, "save_route", Some(route.id)).await;

    (StatusCode::CREATED, Json(route)).into_response()
}

async fn list_my_routes(State(state): State<ApiState>, AuthUser(claims): AuthUser) -> Response {
    match state.store.list_routes_for_user(claims.sub).await {
        Ok(routes) => (StatusCode::OK, Json(routes)).into_response(),
        Err(error) => internal_error(error),
    }
}

async fn list_public_routes(State(state): State<ApiState>) -> Response {
    match state.store.list_public_routes().await {
        Ok(routes) => (StatusCode::OK, Json(routes)).into_response(),
        Err(error) => internal_error(error),
    }
}

/// Maps a planning failure onto the wire: a missing destination is the
/// caller's problem, everything else is an upstream fault with the cause in
/// `details`.
fn plan_error_response(error: &PlanError) -> (StatusCode, Json<Value>) {
    match error {
        PlanError::NoDestination => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string() })),
        ),
        PlanError::Understand(source) | PlanError::MainRoute(source) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": error.to_string(),
                "details": source.to_string(),
            })),
        ),
    }
}

async fn plan_trip(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Json(body): Json<TripQuery>,
) -> Response {
    if body.query.trim().is_empty() || body.origin.trim().is_empty() {
        return bad_request("query and origin are required");
    }

    let Some(planner) = state.planner.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Trip planning is not configured" })),
        )
            .into_response();
    };

    record_activity(&state, claims.sub, "plan_trip", None).await;

    match planner.plan_trip(&body).await {
        Ok(plan) => (StatusCode::OK, Json(plan)).into_response(),
        Err(error) => plan_error_response(&error).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use waymark_core::ClientError;

    use super::*;

    #[test]
    fn missing_destination_maps_to_bad_request() {
        let (status, Json(body)) = plan_error_response(&PlanError::NoDestination);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Could not determine a destination from the query."
        );
        assert!(body.get("details").is_none());
    }

    #[test]
    fn understand_failure_maps_to_internal_with_details() {
        let error = PlanError::Understand(ClientError::Upstream {
            service: "intent extractor",
            detail: "http 503: overloaded".to_string(),
        });

        let (status, Json(body)) = plan_error_response(&error);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to understand query");
        assert_eq!(
            body["details"],
            "intent extractor request failed: http 503: overloaded"
        );
    }

    #[test]
    fn route_failure_maps_to_internal_with_details() {
        let error = PlanError::MainRoute(ClientError::NoRouteFound {
            status: "ZERO_RESULTS".to_string(),
            message: String::new(),
        });

        let (status, Json(body)) = plan_error_response(&error);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to get main route");
        assert_eq!(body["details"], "directions status 'ZERO_RESULTS': ");
    }
}
