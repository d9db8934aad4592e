//! Registration, login, logout and session-token resolution.
//!
//! A user carries at most one active session token, stored as a SHA-256
//! digest. Logging in rotates the token, which invalidates whatever token
//! was previously issued; logging out clears it.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::{is_unique_violation, AuthResponse, LoginRequest, RegisterRequest, User};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

/// Generic message for any login failure; must not reveal which field was wrong
const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Store a fresh token digest on the user row, invalidating any previous one.
/// Returns the plaintext token for the client.
async fn rotate_token(pool: &sqlx::SqlitePool, user_id: &str) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("UPDATE users SET token_hash = ?, updated_at = ? WHERE id = ?")
        .bind(hash_token(&token))
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Resolve a presented token to a user, or None for a stale/unknown token.
pub async fn resolve_token(
    pool: &sqlx::SqlitePool,
    token: &str,
) -> Result<Option<User>, sqlx::Error> {
    let digest = hash_token(token);
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE token_hash = ?")
        .bind(&digest)
        .fetch_optional(pool)
        .await?;

    // Recheck the digest in constant time rather than trusting collation
    Ok(user.filter(|u| {
        u.token_hash
            .as_ref()
            .is_some_and(|stored| stored.as_bytes().ct_eq(digest.as_bytes()).into())
    }))
}

fn validate_register_request(req: &RegisterRequest, min_password_length: usize) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.first_name, "First name") {
        errors.add("first_name", e);
    }
    if let Err(e) = validate_name(&req.last_name, "Last name") {
        errors.add("last_name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password, min_password_length) {
        errors.add("password", e);
    }

    errors.finish()
}

/// Register a new user and issue their first session token
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_register_request(&request, state.config.auth.min_password_length)?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let token = generate_token();
    let now = chrono::Utc::now().to_rfc3339();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
        password_hash,
        token_hash: Some(hash_token(&token)),
        created_at: now.clone(),
        updated_at: now,
    };

    let inserted = sqlx::query(
        "INSERT INTO users (id, first_name, last_name, email, password_hash, token_hash, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.token_hash)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&state.db)
    .await;

    if let Err(err) = inserted {
        // Concurrent registration with the same email lands here
        if is_unique_violation(&err) {
            return Err(ApiError::conflict("Email already registered"));
        }
        return Err(err.into());
    }

    tracing::info!(user_id = %user.id, "Registered new user");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// Login endpoint; rotates the session token on success
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized(MSG_INVALID_CREDENTIALS))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized(MSG_INVALID_CREDENTIALS));
    }

    let token = rotate_token(&state.db, &user.id).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Logout: clear the stored token so it can never authenticate again
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<StatusCode, ApiError> {
    sqlx::query("UPDATE users SET token_hash = NULL, updated_at = ? WHERE id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Extractor for the current authenticated user; rejects anonymous requests
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        resolve_token(&state.db, token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Optional-auth extractor: a missing or stale token yields an anonymous
/// request instead of a rejection
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match extract_token(&parts.headers) {
            Some(token) => Ok(MaybeUser(resolve_token(&state.db, token).await?)),
            None => Ok(MaybeUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert_ne!(hash, "correct horse battery staple");
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_generate_token_entropy() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    async fn test_pool() -> sqlx::SqlitePool {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn seed_user_with_token(pool: &sqlx::SqlitePool, id: &str, token: &str) {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, token_hash) \
             VALUES (?, 'Avery', 'Reader', ?, 'x', ?)",
        )
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind(hash_token(token))
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_rotation_invalidates_previous_token() {
        let pool = test_pool().await;
        seed_user_with_token(&pool, "u1", "old-token").await;

        let user = resolve_token(&pool, "old-token").await.unwrap();
        assert_eq!(user.unwrap().id, "u1");

        let new_token = rotate_token(&pool, "u1").await.unwrap();
        assert_ne!(new_token, "old-token");

        assert!(resolve_token(&pool, "old-token").await.unwrap().is_none());
        let user = resolve_token(&pool, &new_token).await.unwrap();
        assert_eq!(user.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_cleared_token_no_longer_resolves() {
        let pool = test_pool().await;
        seed_user_with_token(&pool, "u1", "session-token").await;

        sqlx::query("UPDATE users SET token_hash = NULL WHERE id = 'u1'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(resolve_token(&pool, "session-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_anonymous() {
        let pool = test_pool().await;
        assert!(resolve_token(&pool, "made-up").await.unwrap().is_none());
    }
}
