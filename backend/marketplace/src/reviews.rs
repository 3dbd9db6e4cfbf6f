//! Mutual post-award reviews.
//!
//! Once a request is awarded (or completed), the client and the awarded
//! developer may each leave exactly one review — and only about their
//! counterpart.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::bids;
use crate::db;
use crate::errors::{is_unique_violation, Error, Result};
use crate::models::{RequestStatus, Review};
use crate::requests;

/// Submit a review of `reviewee_id` for the given request.
pub async fn submit_review(
    pool: &SqlitePool,
    reviewer_id: i64,
    request_id: i64,
    reviewee_id: i64,
    rating: i64,
    comment: Option<&str>,
) -> Result<Review> {
    if !(1..=5).contains(&rating) {
        return Err(Error::Invalid("Rating must be between 1 and 5"));
    }

    let request = requests::get_request(pool, request_id).await?;
    if !matches!(
        request.status,
        RequestStatus::Awarded | RequestStatus::Completed
    ) {
        return Err(Error::Conflict("Only awarded requests can be reviewed"));
    }

    let awarded_bid_id = request
        .awarded_bid_id
        .ok_or(Error::NotFound("Awarded bid not found"))?;
    let awarded_bid = bids::get_bid(pool, awarded_bid_id).await?;

    let is_client = reviewer_id == request.client_id;
    let is_developer = reviewer_id == awarded_bid.developer_id;
    if !is_client && !is_developer {
        return Err(Error::Forbidden("Only project participants can review"));
    }

    // Reviews are about the counterparty, never about yourself.
    if is_client && reviewee_id != awarded_bid.developer_id {
        return Err(Error::Invalid("Clients can only review the awarded developer"));
    }
    if is_developer && reviewee_id != request.client_id {
        return Err(Error::Invalid("Developers can only review the client"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO reviews (request_id, reviewer_id, reviewee_id, rating, comment, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(request_id)
    .bind(reviewer_id)
    .bind(reviewee_id)
    .bind(rating)
    .bind(comment)
    .bind(db::now())
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict("You have already reviewed this request"));
        }
        Err(e) => return Err(e.into()),
    };

    let review = sqlx::query_as::<_, Review>(
        r#"
        SELECT id, request_id, reviewer_id, reviewee_id, rating, comment, created_at
        FROM   reviews
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(review)
}

pub async fn list_reviews_for_request(pool: &SqlitePool, request_id: i64) -> Result<Vec<Review>> {
    let rows = sqlx::query_as::<_, Review>(
        r#"
        SELECT id, request_id, reviewer_id, reviewee_id, rating, comment, created_at
        FROM   reviews
        WHERE  request_id = ?1
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Reviews received by a user, newest first, with their average rating.
#[derive(Debug, Serialize)]
pub struct UserReviews {
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
}

pub async fn list_reviews_for_user(pool: &SqlitePool, user_id: i64) -> Result<UserReviews> {
    let reviews = sqlx::query_as::<_, Review>(
        r#"
        SELECT id, request_id, reviewer_id, reviewee_id, rating, comment, created_at
        FROM   reviews
        WHERE  reviewee_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let average_rating = if reviews.is_empty() {
        None
    } else {
        Some(reviews.iter().map(|r| r.rating as f64).sum::<f64>() / reviews.len() as f64)
    };

    Ok(UserReviews {
        reviews,
        average_rating,
    })
}
