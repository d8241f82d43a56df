//! Account service — registration, login, and bearer tokens.
//!
//! ARCHITECTURE
//! ============
//! Accounts live in the `users` table. Login and registration both hand back
//! a signed HS256 token carrying the account id; websocket upgrades verify
//! that token from the query string, so sockets never touch the database to
//! authenticate.
//!
//! Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$...`), which
//! carry their own salt and parameters.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::game::AccountId;
use crate::protocol::ErrorCode;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("username already taken")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::UsernameTaken => "E_USERNAME_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::InvalidToken => "E_INVALID_TOKEN",
            Self::Hashing(_) => "E_PASSWORD_HASH",
            Self::Signing(_) => "E_TOKEN_SIGNING",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: AccountId,
    pub username: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    #[must_use]
    pub fn bearer(access_token: String) -> Self {
        Self { access_token, token_type: "bearer".into() }
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Sign a token for an account, valid for `ttl_secs`.
///
/// # Errors
///
/// Returns `Signing` if encoding fails.
pub fn issue_token(secret: &str, user_id: AccountId, username: &str, ttl_secs: i64) -> Result<String, AuthError> {
    let exp = (OffsetDateTime::now_utc() + Duration::seconds(ttl_secs)).unix_timestamp();
    let claims = Claims { user_id, username: username.to_string(), exp };
    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;
    Ok(token)
}

/// Verify signature and expiry, returning the claims.
///
/// # Errors
///
/// Returns `InvalidToken` for a bad signature, malformed token, or expiry.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns `Hashing` if the salt or hash cannot be encoded.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::Hashing)?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(AuthError::Hashing)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. A stored value that does
/// not parse never verifies.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

fn validate(credentials: &Credentials) -> Result<(), AuthError> {
    let len = credentials.username.trim().chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(AuthError::InvalidInput(format!(
            "username must be {MIN_USERNAME_LEN}-{MAX_USERNAME_LEN} characters"
        )));
    }
    if credentials.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!("password must be at least {MIN_PASSWORD_LEN} characters")));
    }
    Ok(())
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Create an account and return a token for it.
///
/// # Errors
///
/// Returns `InvalidInput`, `UsernameTaken`, or a database error.
pub async fn register(
    pool: &PgPool,
    secret: &str,
    ttl_secs: i64,
    credentials: &Credentials,
) -> Result<TokenResponse, AuthError> {
    validate(credentials)?;
    let username = credentials.username.trim();
    let password_hash = hash_password(&credentials.password)?;

    let result = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id")
        .bind(username)
        .bind(credentials.email.as_deref())
        .bind(&password_hash)
        .fetch_one(pool)
        .await;

    let row = match result {
        Ok(row) => row,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => return Err(AuthError::UsernameTaken),
        Err(e) => return Err(e.into()),
    };
    let user_id: AccountId = row.get("id");
    info!(user_id, username, "account registered");

    Ok(TokenResponse::bearer(issue_token(secret, user_id, username, ttl_secs)?))
}

/// Check credentials and return a fresh token.
///
/// # Errors
///
/// Returns `InvalidCredentials` for an unknown user or wrong password.
pub async fn login(
    pool: &PgPool,
    secret: &str,
    ttl_secs: i64,
    credentials: &Credentials,
) -> Result<TokenResponse, AuthError> {
    let username = credentials.username.trim();
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let stored: String = row.get("password_hash");
    if !verify_password(&credentials.password, &stored) {
        return Err(AuthError::InvalidCredentials);
    }
    let user_id: AccountId = row.get("id");
    info!(user_id, username, "account logged in");

    Ok(TokenResponse::bearer(issue_token(secret, user_id, username, ttl_secs)?))
}

/// Every registered username, in signup order.
///
/// # Errors
///
/// Returns a database error.
pub async fn list_usernames(pool: &PgPool) -> Result<Vec<String>, AuthError> {
    let users = sqlx::query_scalar("SELECT username FROM users ORDER BY id").fetch_all(pool).await?;
    Ok(users)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
