//! Session resolution.
//!
//! Identity is an external capability: sessions arrive as rows in the
//! `sessions` table (written by the identity provider or the test-setup
//! endpoint), and this module only resolves `Authorization: Bearer`
//! tokens to user ids. Every service function then threads the caller
//! id explicitly instead of relying on ambient request state.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::api::ApiState;
use crate::db;
use crate::errors::{Error, Result};
use crate::models::UserRole;

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: i64,
}

/// Resolve a bearer token to a user id.
pub async fn authenticate(pool: &SqlitePool, token: &str) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM sessions WHERE token = ?1")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    row.map(|(id,)| id).ok_or(Error::Unauthenticated)
}

/// Extract `Bearer <token>` from an Authorization header value.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self> {
        let token = bearer_token(parts).ok_or(Error::Unauthenticated)?;
        let id = authenticate(&state.pool, token).await?;
        Ok(CurrentUser { id })
    }
}

// ─────────────────────────────────────────────────────────
// Provisioning (test-setup endpoint and tests)
// ─────────────────────────────────────────────────────────

/// Insert a profile row and return its id.
pub async fn create_profile(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    role: UserRole,
) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO profiles (email, name, role, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(email)
    .bind(name)
    .bind(role)
    .bind(db::now())
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Mint a session token for a user.
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(&token)
        .bind(user_id)
        .bind(db::now())
        .execute(pool)
        .await?;
    Ok(token)
}

/// Fetch a profile by id.
pub async fn get_profile(pool: &SqlitePool, user_id: i64) -> Result<crate::models::Profile> {
    sqlx::query_as(
        "SELECT id, email, name, role, bio, portfolio_url, created_at \
         FROM profiles WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("User not found"))
}
