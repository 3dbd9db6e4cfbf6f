//! Abuse reports against users, requests, messages, and reviews.
//!
//! Filing is open to any signed-in user; each user may report a given
//! target once. Review and enforcement happen out of band, so the
//! write path here only records the report.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db;
use crate::errors::{is_unique_violation, Error, Result};
use crate::models::{Report, ReportTarget};

#[derive(Debug, Clone, Deserialize)]
pub struct ReportInput {
    pub target_type: ReportTarget,
    pub target_id: i64,
    pub reason: String,
    pub description: Option<String>,
}

/// File a report. A second report by the same user against the same
/// target is a `Conflict`.
pub async fn submit_report(
    pool: &SqlitePool,
    reporter_id: i64,
    input: ReportInput,
) -> Result<Report> {
    if input.reason.trim().is_empty() {
        return Err(Error::Invalid("A report reason is required"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO reports (reporter_id, target_type, target_id, reason, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(reporter_id)
    .bind(input.target_type.as_str())
    .bind(input.target_id)
    .bind(input.reason.trim())
    .bind(&input.description)
    .bind(db::now())
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict("You have already reported this"));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        report_id = id,
        reporter_id,
        target_type = input.target_type.as_str(),
        target_id = input.target_id,
        "report filed"
    );

    let report = sqlx::query_as::<_, Report>(
        r#"
        SELECT id, reporter_id, target_type, target_id, reason, description, created_at
        FROM   reports
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(report)
}

/// Reports filed by a user, newest first.
pub async fn list_my_reports(pool: &SqlitePool, reporter_id: i64) -> Result<Vec<Report>> {
    let rows = sqlx::query_as::<_, Report>(
        r#"
        SELECT id, reporter_id, target_type, target_id, reason, description, created_at
        FROM   reports
        WHERE  reporter_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(reporter_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
