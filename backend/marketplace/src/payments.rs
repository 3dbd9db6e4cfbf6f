//! Escrow payment flow — `pending → held → released`.
//!
//! The amount is copied from the winning bid's price when the payment
//! row is created and is never taken from caller input after that. The
//! caller-supplied amount on the gateway redirect is compared against
//! the stored amount purely for tamper detection: a mismatch is a hard
//! rejection, not a reconciliation signal.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::bids;
use crate::db;
use crate::errors::{is_unique_violation, Error, Result};
use crate::gateway::PaymentGateway;
use crate::models::{Payment, PaymentStatus, RequestStatus};
use crate::requests;

/// What the UI needs to drive the external checkout.
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub payment_id: i64,
    pub order_id: String,
    pub amount: i64,
}

fn new_order_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("ORDER_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Create (or re-enter) the escrow payment for an awarded request.
///
/// Re-invoking while a `pending` payment exists returns the existing
/// record unchanged, so a double-click or back-button resubmission is
/// harmless. A payment already `held` or `released` is a `Conflict`.
pub async fn create_payment(
    pool: &SqlitePool,
    client_id: i64,
    request_id: i64,
    bid_id: i64,
) -> Result<Checkout> {
    let request = requests::get_request(pool, request_id).await?;
    if request.client_id != client_id {
        return Err(Error::Forbidden("Only the request owner can pay"));
    }
    if request.status != RequestStatus::Awarded {
        return Err(Error::Conflict("Only awarded requests can be paid"));
    }
    if request.awarded_bid_id != Some(bid_id) {
        return Err(Error::Conflict("Only the awarded bid can be paid"));
    }

    let bid = bids::get_bid(pool, bid_id).await?;

    if let Some(existing) = get_payment_for_request(pool, request_id).await? {
        return match existing.status {
            PaymentStatus::Pending => Ok(Checkout {
                payment_id: existing.id,
                order_id: existing.order_id,
                amount: existing.amount,
            }),
            _ => Err(Error::Conflict("This request has already been paid")),
        };
    }

    let order_id = new_order_id();
    let result = sqlx::query(
        r#"
        INSERT INTO payments
            (request_id, bid_id, payer_id, payee_id, amount, status, order_id,
             created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)
        "#,
    )
    .bind(request_id)
    .bind(bid_id)
    .bind(client_id)
    .bind(bid.developer_id)
    .bind(bid.price)
    .bind(&order_id)
    .bind(db::now())
    .execute(pool)
    .await;

    let payment_id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            // Lost a concurrent create between the read above and this
            // insert; hand back the winner's record instead.
            let existing = get_payment_for_request(pool, request_id)
                .await?
                .ok_or(Error::NotFound("Payment not found"))?;
            return match existing.status {
                PaymentStatus::Pending => Ok(Checkout {
                    payment_id: existing.id,
                    order_id: existing.order_id,
                    amount: existing.amount,
                }),
                _ => Err(Error::Conflict("This request has already been paid")),
            };
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Checkout {
        payment_id,
        order_id,
        amount: bid.price,
    })
}

/// Confirm a checkout after the gateway redirects back.
///
/// On gateway failure the payment stays `pending`, so the same payer can
/// safely retry. Returns the held payment for post-commit fan-out.
pub async fn confirm_payment(
    pool: &SqlitePool,
    gateway: &dyn PaymentGateway,
    user_id: i64,
    payment_key: &str,
    order_id: &str,
    client_amount: i64,
) -> Result<Payment> {
    let payment = get_payment_by_order(pool, order_id)
        .await?
        .ok_or(Error::NotFound("Payment not found"))?;

    if payment.payer_id != user_id {
        return Err(Error::Forbidden("Only the payer can confirm this payment"));
    }

    // Tamper detection: the redirect's amount must match the stored one.
    if payment.amount != client_amount {
        tracing::error!(
            payment_id = payment.id,
            stored = payment.amount,
            supplied = client_amount,
            "payment amount mismatch"
        );
        return Err(Error::Conflict("Payment amount mismatch"));
    }

    if payment.status != PaymentStatus::Pending {
        return Err(Error::Conflict("This payment has already been processed"));
    }

    // Confirm with the server-held amount, never the caller's.
    gateway
        .confirm(payment_key, order_id, payment.amount)
        .await?;

    let paid_at = db::now();
    let affected = sqlx::query(
        r#"
        UPDATE payments
        SET    status = 'held', payment_key = ?1, paid_at = ?2
        WHERE  id = ?3 AND status = 'pending'
        "#,
    )
    .bind(payment_key)
    .bind(paid_at)
    .bind(payment.id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        // A concurrent confirmation won between our read and write.
        return Err(Error::Conflict("This payment has already been processed"));
    }

    tracing::info!(payment_id = payment.id, order_id, "payment held in escrow");

    Ok(Payment {
        status: PaymentStatus::Held,
        payment_key: Some(payment_key.to_string()),
        paid_at: Some(paid_at),
        ..payment
    })
}

/// Release a held payment to the developer and complete the request.
///
/// Both rows advance in one transaction: no reader can observe the
/// payment released while the request is still `awarded`. This is the
/// only path by which a request reaches `completed`.
pub async fn release_payment(
    pool: &SqlitePool,
    user_id: i64,
    payment_id: i64,
) -> Result<Payment> {
    let payment = get_payment(pool, payment_id).await?;
    if payment.payer_id != user_id {
        return Err(Error::Forbidden("Only the payer can release this payment"));
    }
    if payment.status != PaymentStatus::Held {
        return Err(Error::Conflict("Payment is not held in escrow"));
    }

    let released_at = db::now();
    let mut tx = pool.begin().await?;

    let affected = sqlx::query(
        "UPDATE payments SET status = 'released', released_at = ?1 \
         WHERE id = ?2 AND status = 'held'",
    )
    .bind(released_at)
    .bind(payment_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::Conflict("Payment is not held in escrow"));
    }

    sqlx::query("UPDATE requests SET status = 'completed' WHERE id = ?1 AND status = 'awarded'")
        .bind(payment.request_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        payment_id,
        request_id = payment.request_id,
        amount = payment.amount,
        "escrow released"
    );

    Ok(Payment {
        status: PaymentStatus::Released,
        released_at: Some(released_at),
        ..payment
    })
}

/// Fetch one payment by id.
pub async fn get_payment(pool: &SqlitePool, payment_id: i64) -> Result<Payment> {
    sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, request_id, bid_id, payer_id, payee_id, amount, status,
               order_id, payment_key, paid_at, released_at, created_at
        FROM   payments
        WHERE  id = ?1
        "#,
    )
    .bind(payment_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("Payment not found"))
}

/// The payment for a request, if one exists.
pub async fn get_payment_for_request(
    pool: &SqlitePool,
    request_id: i64,
) -> Result<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, request_id, bid_id, payer_id, payee_id, amount, status,
               order_id, payment_key, paid_at, released_at, created_at
        FROM   payments
        WHERE  request_id = ?1
        "#,
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn get_payment_by_order(pool: &SqlitePool, order_id: &str) -> Result<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, request_id, bid_id, payer_id, payee_id, amount, status,
               order_id, payment_key, paid_at, released_at, created_at
        FROM   payments
        WHERE  order_id = ?1
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
