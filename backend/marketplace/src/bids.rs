//! Bid registry — accept, revise, and withdraw bids.
//!
//! Per-developer uniqueness is enforced by the store's
//! `UNIQUE (request_id, developer_id)` constraint rather than a
//! read-then-write check, closing the race between two concurrent
//! first-time bids. A selected bid is frozen: it can be neither revised
//! nor withdrawn.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db;
use crate::errors::{is_unique_violation, Error, Result};
use crate::models::{Bid, Request, RequestStatus};
use crate::requests;

#[derive(Debug, Clone, Deserialize)]
pub struct BidInput {
    pub price: i64,
    pub message: Option<String>,
    pub estimated_days: Option<i64>,
}

fn validate(input: &BidInput) -> Result<()> {
    if input.price <= 0 {
        return Err(Error::Invalid("Bid price must be greater than zero"));
    }
    if matches!(input.estimated_days, Some(d) if d <= 0) {
        return Err(Error::Invalid("Estimated days must be greater than zero"));
    }
    Ok(())
}

/// Check that `request` still accepts bid mutations right now.
fn ensure_open(request: &Request) -> Result<()> {
    if request.status != RequestStatus::Open {
        return Err(Error::Conflict("Request is no longer open for bids"));
    }
    if request.is_expired(db::now()) {
        return Err(Error::Conflict("The bidding window has expired"));
    }
    Ok(())
}

/// Submit a bid against an open, unexpired request.
///
/// Returns the inserted bid together with the parent request so the
/// caller can fan out the "new bid" notification and open the chat
/// channel without re-reading.
pub async fn submit_bid(
    pool: &SqlitePool,
    developer_id: i64,
    request_id: i64,
    input: BidInput,
) -> Result<(Bid, Request)> {
    validate(&input)?;

    let request = requests::get_request(pool, request_id).await?;
    if request.client_id == developer_id {
        return Err(Error::Forbidden("You cannot bid on your own request"));
    }
    ensure_open(&request)?;

    let now = db::now();
    let result = sqlx::query(
        r#"
        INSERT INTO bids
            (request_id, developer_id, price, message, estimated_days,
             created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        "#,
    )
    .bind(request_id)
    .bind(developer_id)
    .bind(input.price)
    .bind(&input.message)
    .bind(input.estimated_days)
    .bind(now)
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict(
                "You have already bid on this request; revise your bid instead",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((get_bid(pool, id).await?, request))
}

/// Revise an unselected bid while the parent request is open and
/// unexpired.
pub async fn revise_bid(
    pool: &SqlitePool,
    developer_id: i64,
    bid_id: i64,
    input: BidInput,
) -> Result<Bid> {
    validate(&input)?;

    let bid = get_bid(pool, bid_id).await?;
    if bid.developer_id != developer_id {
        return Err(Error::Forbidden("Only the bid owner can revise it"));
    }
    if bid.is_selected {
        return Err(Error::Conflict("A selected bid cannot be revised"));
    }

    let request = requests::get_request(pool, bid.request_id).await?;
    ensure_open(&request)?;

    // The is_selected guard repeats inside the UPDATE in case the award
    // engine selected this bid between the read above and here.
    let affected = sqlx::query(
        r#"
        UPDATE bids
        SET    price = ?1, message = ?2, estimated_days = ?3, updated_at = ?4
        WHERE  id = ?5 AND developer_id = ?6 AND is_selected = 0
        "#,
    )
    .bind(input.price)
    .bind(&input.message)
    .bind(input.estimated_days)
    .bind(db::now())
    .bind(bid_id)
    .bind(developer_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::Conflict("A selected bid cannot be revised"));
    }

    get_bid(pool, bid_id).await
}

/// Withdraw an unselected bid.
pub async fn withdraw_bid(pool: &SqlitePool, developer_id: i64, bid_id: i64) -> Result<()> {
    let bid = get_bid(pool, bid_id).await?;
    if bid.developer_id != developer_id {
        return Err(Error::Forbidden("Only the bid owner can withdraw it"));
    }

    let affected = sqlx::query(
        "DELETE FROM bids WHERE id = ?1 AND developer_id = ?2 AND is_selected = 0",
    )
    .bind(bid_id)
    .bind(developer_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::Conflict("A selected bid cannot be withdrawn"));
    }
    Ok(())
}

/// Fetch one bid by id.
pub async fn get_bid(pool: &SqlitePool, bid_id: i64) -> Result<Bid> {
    sqlx::query_as::<_, Bid>(
        r#"
        SELECT id, request_id, developer_id, price, message, estimated_days,
               is_selected, selected_at, created_at, updated_at
        FROM   bids
        WHERE  id = ?1
        "#,
    )
    .bind(bid_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("Bid not found"))
}

/// All bids on a request, oldest first.
pub async fn list_bids_for_request(pool: &SqlitePool, request_id: i64) -> Result<Vec<Bid>> {
    let rows = sqlx::query_as::<_, Bid>(
        r#"
        SELECT id, request_id, developer_id, price, message, estimated_days,
               is_selected, selected_at, created_at, updated_at
        FROM   bids
        WHERE  request_id = ?1
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One developer's bid on a request, if any.
pub async fn get_my_bid_for_request(
    pool: &SqlitePool,
    developer_id: i64,
    request_id: i64,
) -> Result<Option<Bid>> {
    let row = sqlx::query_as::<_, Bid>(
        r#"
        SELECT id, request_id, developer_id, price, message, estimated_days,
               is_selected, selected_at, created_at, updated_at
        FROM   bids
        WHERE  request_id = ?1 AND developer_id = ?2
        "#,
    )
    .bind(request_id)
    .bind(developer_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All bids placed by one developer, newest first.
pub async fn list_my_bids(pool: &SqlitePool, developer_id: i64) -> Result<Vec<Bid>> {
    let rows = sqlx::query_as::<_, Bid>(
        r#"
        SELECT id, request_id, developer_id, price, message, estimated_days,
               is_selected, selected_at, created_at, updated_at
        FROM   bids
        WHERE  developer_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(developer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
