//! Award engine — the single authoritative transition from "many open
//! bids" to "one winner".
//!
//! The whole selection runs inside one transaction whose commit point is
//! a conditional update on the request row:
//!
//! ```text
//! UPDATE requests SET status = 'awarded', ...
//! WHERE  id = ? AND status = 'open'
//! ```
//!
//! Exactly one of two concurrent callers can see that update affect a
//! row; the loser observes zero rows and gets a `Conflict` instead of
//! silently double-awarding. Row locks on the bid alone would not be
//! enough because the at-most-one-winner invariant spans both the bids
//! and requests tables.

use sqlx::SqlitePool;

use crate::db;
use crate::errors::{Error, Result};
use crate::models::{Bid, Request, RequestStatus};

/// Everything the caller needs for post-commit fan-out.
#[derive(Debug)]
pub struct AwardOutcome {
    pub request: Request,
    pub winning_bid: Bid,
    /// Developer ids of every bid that was not selected.
    pub losing_developer_ids: Vec<i64>,
}

/// Select `bid_id` as the winning bid on its request.
///
/// Preconditions are re-checked inside the transaction so that two
/// concurrent selections (or a retried request) are strictly ordered:
/// the second caller fails with `Conflict` rather than racing to
/// completion.
pub async fn select_winning_bid(
    pool: &SqlitePool,
    client_id: i64,
    bid_id: i64,
) -> Result<AwardOutcome> {
    let mut tx = pool.begin().await?;

    let bid: Bid = sqlx::query_as(
        r#"
        SELECT id, request_id, developer_id, price, message, estimated_days,
               is_selected, selected_at, created_at, updated_at
        FROM   bids
        WHERE  id = ?1
        "#,
    )
    .bind(bid_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(Error::NotFound("Bid not found"))?;

    let request: Request = sqlx::query_as(
        r#"
        SELECT id, client_id, title, description, budget_min, budget_max,
               deadline, status, created_at, expires_at, awarded_bid_id, awarded_at
        FROM   requests
        WHERE  id = ?1
        "#,
    )
    .bind(bid.request_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(Error::NotFound("Request not found"))?;

    if request.client_id != client_id {
        return Err(Error::Forbidden("Only the request owner can select a bid"));
    }
    if !request.status.can_transition_to(RequestStatus::Awarded) {
        return Err(Error::Conflict("Request is not open for selection"));
    }

    let now = db::now();

    // Compare-and-swap on the request status; this is the race arbiter.
    let awarded = sqlx::query(
        r#"
        UPDATE requests
        SET    status = 'awarded', awarded_bid_id = ?1, awarded_at = ?2
        WHERE  id = ?3 AND status = 'open'
        "#,
    )
    .bind(bid_id)
    .bind(now)
    .bind(request.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if awarded != 1 {
        return Err(Error::Conflict("A winning bid has already been selected"));
    }

    // Clear siblings first (a no-op in the normal case), then flag the
    // winner, so exactly one selected bid exists at commit.
    sqlx::query("UPDATE bids SET is_selected = 0, selected_at = NULL WHERE request_id = ?1")
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE bids SET is_selected = 1, selected_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(bid_id)
        .execute(&mut *tx)
        .await?;

    let losing_developer_ids: Vec<i64> = sqlx::query_as::<_, (i64,)>(
        "SELECT developer_id FROM bids WHERE request_id = ?1 AND id != ?2",
    )
    .bind(request.id)
    .bind(bid_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|(id,)| id)
    .collect();

    tx.commit().await?;

    tracing::info!(
        request_id = request.id,
        bid_id,
        developer_id = bid.developer_id,
        "bid selected"
    );

    let request = Request {
        status: RequestStatus::Awarded,
        awarded_bid_id: Some(bid_id),
        awarded_at: Some(now),
        ..request
    };
    let winning_bid = Bid {
        is_selected: true,
        selected_at: Some(now),
        ..bid
    };

    Ok(AwardOutcome {
        request,
        winning_bid,
        losing_developer_ids,
    })
}
