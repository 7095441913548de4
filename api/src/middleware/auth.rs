use crate::utils::{AppError, AppResult};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Authenticated identity threaded through request extensions (spec §1: auth
/// contributes only a verified `user_id` string to every request).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
    jti: String,
}

const JWT_CACHE_CAPACITY: usize = 1000;
const JWT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Bounded TTL/LRU cache of decoded tokens, keyed by the raw token string
/// (spec §5: "JWT decode results may be cached for 5 minutes ... bounded,
/// LRU/TTL"). Decoding is cheap but this still saves the signature check on
/// every request in a hot path.
struct JwtCache {
    entries: Mutex<HashMap<String, (AuthUser, Instant)>>,
    order: Mutex<VecDeque<String>>,
}

impl JwtCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
        }
    }

    fn get(&self, token: &str) -> Option<AuthUser> {
        let entries = self.entries.lock().unwrap();
        match entries.get(token) {
            Some((user, inserted_at)) if inserted_at.elapsed() < JWT_CACHE_TTL => {
                Some(user.clone())
            }
            _ => None,
        }
    }

    fn insert(&self, token: String, user: AuthUser) {
        let mut entries = self.entries.lock().unwrap();
        let mut order = self.order.lock().unwrap();

        if !entries.contains_key(&token) {
            order.push_back(token.clone());
        }
        entries.insert(token.clone(), (user, Instant::now()));

        while entries.len() > JWT_CACHE_CAPACITY {
            if let Some(oldest) = order.pop_front() {
                entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    secret: String,
    algorithm: Algorithm,
    expiry_days: i64,
    cache: Arc<JwtCache>,
}

impl AuthState {
    pub fn new(secret: String, algorithm: &str, expiry_days: i64) -> Self {
        let algorithm = match algorithm.to_uppercase().as_str() {
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            _ => Algorithm::HS256,
        };
        Self {
            secret,
            algorithm,
            expiry_days,
            cache: Arc::new(JwtCache::new()),
        }
    }

    /// Issues a JWT for `user_id` (spec §4.K: HS256 default, `JWT_EXPIRY_DAYS`
    /// default 30, carries a `jti` claim).
    pub fn issue(&self, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ChronoDuration::days(self.expiry_days)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("failed to issue token: {e}")))
    }

    pub fn verify(&self, token: &str) -> AppResult<AuthUser> {
        if let Some(user) = self.cache.get(token) {
            return Ok(user);
        }

        let validation = Validation::new(self.algorithm);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AppError::Unauthenticated(format!("invalid token: {e}")))?;

        let user = AuthUser {
            user_id: data.claims.sub,
        };
        self.cache.insert(token.to_string(), user.clone());
        Ok(user)
    }
}

/// Extracts a bearer credential per spec §6: a cookie named `auth_token` for
/// same-site requests, or a `Bearer <token>` header for cross-site ones.
fn extract_token(headers: &HeaderMap) -> AppResult<String> {
    if let Some(auth_header) = headers.get("Authorization") {
        let value = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthenticated("invalid Authorization header".to_string()))?;
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Ok(token.to_string());
        }
    }

    if let Some(cookie_header) = headers.get("Cookie") {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for part in cookie_str.split(';') {
                let part = part.trim();
                if let Some(token) = part.strip_prefix("auth_token=") {
                    return Ok(token.to_string());
                }
            }
        }
    }

    Err(AppError::Unauthenticated(
        "missing bearer token or auth_token cookie".to_string(),
    ))
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&headers)?;
    let user = auth_state.verify(&token)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn get_auth_user(request: &Request) -> AppResult<AuthUser> {
    request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthenticated("user not authenticated".to_string()))
}
