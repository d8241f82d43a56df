//! Friends service — friend requests, friend lists, and user search.
//!
//! A relationship is one `friendships` row keyed by (requester, addressee).
//! It starts `pending`; only the addressee can accept or reject it. A row in
//! either direction blocks a new request, so a pair never has two.

use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::game::AccountId;
use crate::protocol::ErrorCode;

pub const MAX_SEARCH_RESULTS: i64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum FriendError {
    #[error("you cannot send a friend request to yourself")]
    SelfRequest,
    #[error("user not found: {0}")]
    UserNotFound(AccountId),
    #[error("friend request not found")]
    RequestNotFound,
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for FriendError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SelfRequest => "E_SELF_REQUEST",
            Self::UserNotFound(_) => "E_USER_NOT_FOUND",
            Self::RequestNotFound => "E_REQUEST_NOT_FOUND",
            Self::EmptyQuery => "E_INVALID_INPUT",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Sent,
    /// A pending, accepted, or rejected row already links the pair.
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: AccountId,
    pub username: String,
}

/// `ILIKE` pattern matching `query` anywhere, with wildcards escaped.
pub(crate) fn like_pattern(query: &str) -> Result<String, FriendError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(FriendError::EmptyQuery);
    }
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Ok(pattern)
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Send a friend request from `from` to `to`.
///
/// # Errors
///
/// Returns `SelfRequest`, `UserNotFound` for an unknown target, or a
/// database error.
pub async fn send_request(pool: &PgPool, from: AccountId, to: AccountId) -> Result<RequestOutcome, FriendError> {
    if from == to {
        return Err(FriendError::SelfRequest);
    }

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT status FROM friendships \
         WHERE (requester_id = $1 AND addressee_id = $2) OR (requester_id = $2 AND addressee_id = $1)",
    )
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await?;
    if existing.is_some() {
        return Ok(RequestOutcome::Exists);
    }

    let result = sqlx::query("INSERT INTO friendships (requester_id, addressee_id, status) VALUES ($1, $2, $3)")
        .bind(from)
        .bind(to)
        .bind(FriendStatus::Pending.as_str())
        .execute(pool)
        .await;

    match result {
        Ok(_) => {
            info!(from, to, "friend request sent");
            Ok(RequestOutcome::Sent)
        }
        Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(FriendError::UserNotFound(to)),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(RequestOutcome::Exists),
        Err(e) => Err(e.into()),
    }
}

/// Accept or reject a pending request that `requester` sent to `addressee`.
///
/// # Errors
///
/// Returns `RequestNotFound` when no pending request links them that way.
pub async fn respond(
    pool: &PgPool,
    requester: AccountId,
    addressee: AccountId,
    status: FriendStatus,
) -> Result<(), FriendError> {
    let result = sqlx::query(
        "UPDATE friendships SET status = $3, updated_at = now() \
         WHERE requester_id = $1 AND addressee_id = $2 AND status = 'pending'",
    )
    .bind(requester)
    .bind(addressee)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(FriendError::RequestNotFound);
    }
    info!(requester, addressee, status = status.as_str(), "friend request answered");
    Ok(())
}

// =============================================================================
// QUERIES
// =============================================================================

/// Account ids of everyone `user_id` is friends with.
///
/// # Errors
///
/// Returns a database error.
pub async fn list_friends(pool: &PgPool, user_id: AccountId) -> Result<Vec<AccountId>, FriendError> {
    let ids = sqlx::query_scalar(
        "SELECT CASE WHEN requester_id = $1 THEN addressee_id ELSE requester_id END AS friend_id \
         FROM friendships \
         WHERE (requester_id = $1 OR addressee_id = $1) AND status = 'accepted' \
         ORDER BY friend_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Senders of pending requests addressed to `user_id`, oldest first.
///
/// # Errors
///
/// Returns a database error.
pub async fn incoming_requests(pool: &PgPool, user_id: AccountId) -> Result<Vec<AccountId>, FriendError> {
    let ids = sqlx::query_scalar(
        "SELECT requester_id FROM friendships \
         WHERE addressee_id = $1 AND status = 'pending' \
         ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Whether the pair has an accepted friendship, in either direction.
///
/// # Errors
///
/// Returns a database error.
pub async fn are_friends(pool: &PgPool, a: AccountId, b: AccountId) -> Result<bool, FriendError> {
    let friends = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM friendships \
         WHERE ((requester_id = $1 AND addressee_id = $2) OR (requester_id = $2 AND addressee_id = $1)) \
         AND status = 'accepted')",
    )
    .bind(a)
    .bind(b)
    .fetch_one(pool)
    .await?;
    Ok(friends)
}

/// Accounts whose username contains `query`, excluding the caller.
///
/// # Errors
///
/// Returns `EmptyQuery` for a blank query, or a database error.
pub async fn search_users(pool: &PgPool, user_id: AccountId, query: &str) -> Result<Vec<UserSummary>, FriendError> {
    let pattern = like_pattern(query)?;
    let rows = sqlx::query(
        "SELECT id, username FROM users \
         WHERE username ILIKE $1 ESCAPE '\\' AND id <> $2 \
         ORDER BY username LIMIT $3",
    )
    .bind(pattern)
    .bind(user_id)
    .bind(MAX_SEARCH_RESULTS)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| UserSummary { id: row.get("id"), username: row.get("username") })
        .collect())
}

#[cfg(test)]
#[path = "friends_test.rs"]
mod tests;
