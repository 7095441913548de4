//! User signup/login (spec §1, §6: "authentication only contributes a
//! verified `user_id` string to every request" — the identity provider and
//! password hashing are otherwise external collaborators, but signup/login
//! need *some* concrete implementation to issue the JWT the rest of the
//! system treats as already-verified).

use crate::models::MIN_PASSWORD_LEN;
use crate::utils::{AppError, AppResult};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct SignedUpUser {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
    }

    fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("stored password hash is malformed: {e}")))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    }

    pub async fn signup(&self, email: &str, password: &str) -> AppResult<SignedUpUser> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("a valid email is required".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let existing: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(&self.db)
            .await?;
        if existing {
            return Err(AppError::Conflict("an account with this email already exists".to_string()));
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let password_hash = Self::hash_password(password)?;

        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(&email)
            .bind(&password_hash)
            .bind(created_at)
            .execute(&self.db)
            .await?;

        Ok(SignedUpUser { id, email, created_at })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<SignedUpUser> {
        let email = email.trim().to_lowercase();
        let row: Option<(Uuid, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?;

        let Some((id, email, password_hash, created_at)) = row else {
            return Err(AppError::Unauthenticated("invalid email or password".to_string()));
        };

        if !Self::verify_password(password, &password_hash)? {
            return Err(AppError::Unauthenticated("invalid email or password".to_string()));
        }

        Ok(SignedUpUser { id, email, created_at })
    }
}
