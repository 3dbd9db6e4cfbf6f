//! Notification fan-out — in-app records plus optional email.
//!
//! Every helper here is fire-and-forget: failures are logged and
//! swallowed so that a notification or email problem can never roll
//! back or retry the state transition that triggered it.

use sqlx::SqlitePool;
use tracing::warn;

use crate::auth;
use crate::db;
use crate::email::{self, Mailer};
use crate::errors::Result;
use crate::models::Notification;

/// Insert one notification row.
pub async fn create_notification(
    pool: &SqlitePool,
    user_id: i64,
    kind: &str,
    title: &str,
    content: Option<&str>,
    link: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, type, title, content, link, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(title)
    .bind(content)
    .bind(link)
    .bind(db::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Best-effort wrapper: log and swallow.
async fn notify(
    pool: &SqlitePool,
    user_id: i64,
    kind: &str,
    title: &str,
    content: &str,
    link: &str,
) {
    if let Err(e) = create_notification(pool, user_id, kind, title, Some(content), Some(link)).await
    {
        warn!(user_id, kind, "failed to create notification: {e}");
    }
}

/// Best-effort email to a user, looked up by profile id.
async fn mail(pool: &SqlitePool, mailer: &Mailer, user_id: i64, subject: &str, html: &str) {
    let to = match auth::get_profile(pool, user_id).await {
        Ok(profile) => profile.email,
        Err(e) => {
            warn!(user_id, "failed to resolve email recipient: {e}");
            return;
        }
    };
    if let Err(e) = mailer.send(&to, subject, html).await {
        warn!(user_id, "failed to send email: {e}");
    }
}

// ─────────────────────────────────────────────────────────
// Per-event helpers
// ─────────────────────────────────────────────────────────

pub async fn new_bid(
    pool: &SqlitePool,
    mailer: &Mailer,
    client_id: i64,
    request_id: i64,
    request_title: &str,
    developer_name: &str,
    price: i64,
) {
    let link = format!("/requests/{request_id}");
    notify(
        pool,
        client_id,
        "new_bid",
        "A new bid has arrived",
        &format!("{developer_name} bid on \"{request_title}\""),
        &link,
    )
    .await;
    let (subject, html) =
        email::new_bid(&mailer.site_url, request_title, developer_name, price, request_id);
    mail(pool, mailer, client_id, &subject, &html).await;
}

pub async fn awarded(
    pool: &SqlitePool,
    mailer: &Mailer,
    developer_id: i64,
    request_id: i64,
    request_title: &str,
    client_name: &str,
    price: i64,
) {
    let link = format!("/requests/{request_id}");
    notify(
        pool,
        developer_id,
        "awarded",
        "Congratulations! Your bid was selected",
        &format!("You won \"{request_title}\""),
        &link,
    )
    .await;
    let (subject, html) =
        email::awarded(&mailer.site_url, request_title, client_name, price, request_id);
    mail(pool, mailer, developer_id, &subject, &html).await;
}

pub async fn not_selected(
    pool: &SqlitePool,
    developer_id: i64,
    request_id: i64,
    request_title: &str,
) {
    notify(
        pool,
        developer_id,
        "not_selected",
        "Bid result",
        &format!("Another developer was selected for \"{request_title}\""),
        &format!("/requests/{request_id}"),
    )
    .await;
}

pub async fn payment_received(
    pool: &SqlitePool,
    mailer: &Mailer,
    developer_id: i64,
    request_id: i64,
    request_title: &str,
    amount: i64,
) {
    let link = format!("/requests/{request_id}");
    notify(
        pool,
        developer_id,
        "payment_received",
        "Payment completed",
        &format!("{amount} has been deposited into escrow"),
        &link,
    )
    .await;
    let (subject, html) =
        email::payment_received(&mailer.site_url, request_title, amount, request_id);
    mail(pool, mailer, developer_id, &subject, &html).await;
}

pub async fn project_completed(
    pool: &SqlitePool,
    mailer: &Mailer,
    developer_id: i64,
    request_id: i64,
    request_title: &str,
    amount: i64,
) {
    let link = format!("/requests/{request_id}");
    notify(
        pool,
        developer_id,
        "project_completed",
        "Project completed",
        &format!("{amount} has been paid out"),
        &link,
    )
    .await;
    let (subject, html) =
        email::project_completed(&mailer.site_url, request_title, amount, request_id);
    mail(pool, mailer, developer_id, &subject, &html).await;
}

pub async fn review_received(pool: &SqlitePool, reviewee_id: i64, request_id: i64, rating: i64) {
    notify(
        pool,
        reviewee_id,
        "review_received",
        "A new review was posted",
        &format!("You received a {rating}-star review"),
        &format!("/requests/{request_id}"),
    )
    .await;
}

// ─────────────────────────────────────────────────────────
// Read side
// ─────────────────────────────────────────────────────────

pub async fn list_my_notifications(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, type, title, content, link, is_read, created_at
        FROM   notifications
        WHERE  user_id = ?1
        ORDER  BY created_at DESC, id DESC
        LIMIT  ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn unread_count(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn mark_read(pool: &SqlitePool, user_id: i64, notification_id: i64) -> Result<()> {
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2")
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_all_read(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
