use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::ApiState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    pub exp: i64,
}

/// HS256 bearer tokens: `base64url(header).base64url(claims).base64url(mac)`.
#[derive(Clone)]
pub struct TokenKeys {
    secret: Arc<String>,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: String, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, username: &str, role: &str) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role: role.to_string(),
            exp: (Utc::now() + chrono::Duration::from_std(self.ttl)?).timestamp(),
        };

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{payload}");

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .context("failed to key token mac")?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut parts = token.splitn(3, '.');
        let (Some(header), Some(payload), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            bail!("malformed token");
        };

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .context("failed to key token mac")?;
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .context("malformed token signature")?;
        mac.verify_slice(&signature)
            .map_err(|_| anyhow::anyhow!("token signature mismatch"))?;

        let claims: Claims = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(payload)
                .context("malformed token payload")?,
        )
        .context("malformed token claims")?;

        if claims.exp < Utc::now().timestamp() {
            bail!("token expired");
        }

        Ok(claims)
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

fn bearer_claims(parts: &Parts, state: &ApiState) -> Result<Claims, Response> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| unauthorized("Authorization token required"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Authorization token required"))?;

    state
        .token_keys
        .verify(token)
        .map_err(|_| unauthorized("Invalid or expired token"))
}

/// Any authenticated account.
pub struct AuthUser(pub Claims);

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        bearer_claims(parts, state).map(AuthUser)
    }
}

/// An authenticated account carrying the admin role.
pub struct AdminUser(pub Claims);

impl FromRequestParts<ApiState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if claims.role != waymark_core::ROLE_ADMIN {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Access denied. Administrator privileges are required."
                })),
            )
                .into_response());
        }
        Ok(AdminUser(claims))
    }
}

/// Sliding-window counter of failed logins keyed by username. Successful
/// logins clear the window.
#[derive(Clone)]
pub struct FailedLoginLimiter {
    attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    window: Duration,
    max_failures: usize,
}

impl FailedLoginLimiter {
    pub fn new(window: Duration, max_failures: usize) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_failures,
        }
    }

    pub fn allow(&self, username: &str) -> bool {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        let Some(failures) = attempts.get_mut(username) else {
            return true;
        };
        failures.retain(|at| now.duration_since(*at) < self.window);
        // Fully-expired windows are dropped so the map only holds usernames
        // with live failures.
        if failures.is_empty() {
            attempts.remove(username);
            return true;
        }
        failures.len() < self.max_failures
    }

    pub fn record_failure(&self, username: &str) {
        self.attempts
            .lock()
            .entry(username.to_string())
            .or_default()
            .push(Instant::now());
    }

    pub fn clear(&self, username: &str) {
        self.attempts.lock().remove(username);
    }
}
