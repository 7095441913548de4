use axum::{extract::State, http::header, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::middleware::AuthUser;
use crate::models::{AuthResponse, LoginRequest, SignupRequest, UserResponse};
use crate::services::AppServices;
use crate::utils::{envelope, AppError, AppResult};

const AUTH_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 3600;

fn set_cookie_response(token: &str, body: serde_json::Value) -> impl IntoResponse {
    let cookie = format!(
        "auth_token={token}; HttpOnly; Path=/; Max-Age={AUTH_COOKIE_MAX_AGE_SECS}; SameSite=Lax"
    );
    ([(header::SET_COOKIE, cookie)], Json(body))
}

pub async fn signup(
    State(services): State<Arc<AppServices>>,
    Json(input): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let user = services.auth.signup(&input.email, &input.password).await?;
    let token = services.auth_state.issue(&user.id.to_string())?;

    let body = envelope(
        AuthResponse {
            message: "account created".to_string(),
            user: UserResponse { id: user.id.to_string(), email: user.email, created_at: user.created_at },
            token: token.clone(),
        },
        None,
    );
    Ok(set_cookie_response(&token, body))
}

pub async fn login(
    State(services): State<Arc<AppServices>>,
    Json(input): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = services.auth.login(&input.email, &input.password).await?;
    let token = services.auth_state.issue(&user.id.to_string())?;

    let body = envelope(
        AuthResponse {
            message: "logged in".to_string(),
            user: UserResponse { id: user.id.to_string(), email: user.email, created_at: user.created_at },
            token: token.clone(),
        },
        None,
    );
    Ok(set_cookie_response(&token, body))
}

/// Best-effort revocation (spec §4.K): the JWT itself stays valid until
/// expiry since verification is stateless; this only clears the client's
/// cookie so same-site requests stop presenting it.
pub async fn logout() -> impl IntoResponse {
    let cookie = "auth_token=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax";
    ([(header::SET_COOKIE, cookie)], Json(envelope(serde_json::Value::Null, None)))
}

pub async fn me(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let id = uuid::Uuid::parse_str(&user.user_id)
        .map_err(|_| AppError::Unauthenticated("invalid subject claim".to_string()))?;

    let row: Option<(String, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as("SELECT email, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&services.db)
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;

    let (email, created_at) = row.ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    Ok(Json(envelope(UserResponse { id: user.user_id, email, created_at }, None)))
}
