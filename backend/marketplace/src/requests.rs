//! Request registry — CRUD for clients' posted jobs.
//!
//! The bidding window (`expires_at`) is fixed at creation time and never
//! extended; expiry is enforced lazily at each mutating call rather than
//! by a background sweep, so listings filter on `expires_at` as well.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db;
use crate::errors::{Error, Result};
use crate::models::{Request, RequestStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub title: String,
    pub description: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    pub title: String,
    pub description: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: Option<String>,
}

/// A request row joined with its bid count, for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RequestWithBidCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: Request,
    pub bid_count: i64,
}

fn validate(title: &str, description: &str, budget_min: i64, budget_max: i64) -> Result<()> {
    if title.trim().len() < 5 {
        return Err(Error::Invalid("Title must be at least 5 characters"));
    }
    if description.trim().len() < 20 {
        return Err(Error::Invalid("Description must be at least 20 characters"));
    }
    if budget_min <= 0 || budget_max <= 0 {
        return Err(Error::Invalid("Budget must be greater than zero"));
    }
    if budget_min > budget_max {
        return Err(Error::Invalid("Minimum budget cannot exceed maximum budget"));
    }
    Ok(())
}

/// Post a new request. The bidding window opens immediately and closes
/// `bid_window_hours` later.
pub async fn create_request(
    pool: &SqlitePool,
    client_id: i64,
    new: NewRequest,
    bid_window_hours: i64,
) -> Result<Request> {
    validate(&new.title, &new.description, new.budget_min, new.budget_max)?;

    let now = db::now();
    let expires_at = now + bid_window_hours * 3600;

    let id = sqlx::query(
        r#"
        INSERT INTO requests
            (client_id, title, description, budget_min, budget_max, deadline,
             status, created_at, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, ?8)
        "#,
    )
    .bind(client_id)
    .bind(new.title.trim())
    .bind(new.description.trim())
    .bind(new.budget_min)
    .bind(new.budget_max)
    .bind(&new.deadline)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_request(pool, id).await
}

/// Edit a request. Owner only, and only while the request is open.
pub async fn update_request(
    pool: &SqlitePool,
    client_id: i64,
    request_id: i64,
    update: UpdateRequest,
) -> Result<Request> {
    validate(
        &update.title,
        &update.description,
        update.budget_min,
        update.budget_max,
    )?;

    let request = get_request(pool, request_id).await?;
    if request.client_id != client_id {
        return Err(Error::Forbidden("Only the request owner can edit it"));
    }
    if request.status != RequestStatus::Open {
        return Err(Error::Conflict("Only open requests can be edited"));
    }

    sqlx::query(
        r#"
        UPDATE requests
        SET    title = ?1, description = ?2, budget_min = ?3, budget_max = ?4,
               deadline = ?5
        WHERE  id = ?6 AND client_id = ?7
        "#,
    )
    .bind(update.title.trim())
    .bind(update.description.trim())
    .bind(update.budget_min)
    .bind(update.budget_max)
    .bind(&update.deadline)
    .bind(request_id)
    .bind(client_id)
    .execute(pool)
    .await?;

    get_request(pool, request_id).await
}

/// Cancel an open request. `cancelled` is terminal and reachable from
/// `open` only; the conditional update closes the race with a concurrent
/// award.
pub async fn cancel_request(pool: &SqlitePool, client_id: i64, request_id: i64) -> Result<()> {
    let request = get_request(pool, request_id).await?;
    if request.client_id != client_id {
        return Err(Error::Forbidden("Only the request owner can cancel it"));
    }

    let affected = sqlx::query(
        "UPDATE requests SET status = 'cancelled' WHERE id = ?1 AND status = 'open'",
    )
    .bind(request_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::Conflict("Only open requests can be cancelled"));
    }
    Ok(())
}

/// Fetch one request by id.
pub async fn get_request(pool: &SqlitePool, request_id: i64) -> Result<Request> {
    sqlx::query_as::<_, Request>(
        r#"
        SELECT id, client_id, title, description, budget_min, budget_max,
               deadline, status, created_at, expires_at, awarded_bid_id, awarded_at
        FROM   requests
        WHERE  id = ?1
        "#,
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("Request not found"))
}

/// All open, unexpired requests, newest first, with bid counts.
pub async fn list_open_requests(pool: &SqlitePool) -> Result<Vec<RequestWithBidCount>> {
    let rows = sqlx::query_as::<_, RequestWithBidCount>(
        r#"
        SELECT r.id, r.client_id, r.title, r.description, r.budget_min, r.budget_max,
               r.deadline, r.status, r.created_at, r.expires_at, r.awarded_bid_id,
               r.awarded_at,
               (SELECT COUNT(*) FROM bids b WHERE b.request_id = r.id) AS bid_count
        FROM   requests r
        WHERE  r.status = 'open' AND r.expires_at > ?1
        ORDER  BY r.created_at DESC, r.id DESC
        "#,
    )
    .bind(db::now())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All requests posted by one client, newest first, with bid counts.
pub async fn list_my_requests(pool: &SqlitePool, client_id: i64) -> Result<Vec<RequestWithBidCount>> {
    let rows = sqlx::query_as::<_, RequestWithBidCount>(
        r#"
        SELECT r.id, r.client_id, r.title, r.description, r.budget_min, r.budget_max,
               r.deadline, r.status, r.created_at, r.expires_at, r.awarded_bid_id,
               r.awarded_at,
               (SELECT COUNT(*) FROM bids b WHERE b.request_id = r.id) AS bid_count
        FROM   requests r
        WHERE  r.client_id = ?1
        ORDER  BY r.created_at DESC, r.id DESC
        "#,
    )
    .bind(client_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
