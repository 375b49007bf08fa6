//! Bearer API-key authentication.
//!
//! Keys are stored as salted SHA-256 hashes; a request's bearer token is
//! hashed and looked up to resolve the calling user, whose role yields the
//! [`Actor`] passed into every state transition.

use axum::http::HeaderMap;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db::queries;
use crate::error::{msg, AppError, Result};
use crate::models::{Actor, User, UserRole};

/// Hash an API key for storage and lookup. Application-salted SHA-256,
/// lowercase hex.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"escrowd-v1:");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the bearer token from an Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Resolve the authenticated user from request headers.
pub fn authenticate(conn: &Connection, headers: &HeaderMap) -> Result<User> {
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    queries::get_user_by_api_key(conn, token)?.ok_or(AppError::Unauthorized)
}

/// Resolve the authenticated user as an [`Actor`].
pub fn authenticate_actor(conn: &Connection, headers: &HeaderMap) -> Result<Actor> {
    Ok(Actor::from_user(&authenticate(conn, headers)?))
}

/// Resolve the authenticated user and require the admin role.
pub fn authenticate_admin(conn: &Connection, headers: &HeaderMap) -> Result<User> {
    let user = authenticate(conn, headers)?;
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }
    Ok(user)
}
