//! Application-wide error types.
//!
//! Business-rule violations are plain values of this enum and never
//! bubble up as panics; the `IntoResponse` impl maps the taxonomy onto
//! HTTP statuses with a JSON `{ "error": ... }` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No valid session on an auth-gated operation.
    #[error("Sign-in required")]
    Unauthenticated,

    /// Authenticated, but not allowed to touch this resource.
    #[error("{0}")]
    Forbidden(&'static str),

    /// Referenced entity is absent.
    #[error("{0}")]
    NotFound(&'static str),

    /// A state-machine precondition failed: duplicate bid, expired
    /// window, already awarded, amount mismatch, wrong payment status.
    #[error("{0}")]
    Conflict(&'static str),

    /// Malformed input (non-positive price, budget min > max, ...).
    #[error("{0}")]
    Invalid(&'static str),

    /// The payment gateway rejected a confirmation; the payment stays
    /// `pending` so the payer can retry.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The email service rejected a send; fan-out callers swallow this.
    #[error("Email service error: {0}")]
    Email(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Gateway(_) | Error::Email(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Migrate(_) | Error::Http(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// True when `err` is the store rejecting a duplicate row (UNIQUE
/// constraint), which the registry surfaces as a `Conflict`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
