//! Row types and lifecycle enums shared across all modules.
//!
//! ## Status as a Finite-State Machine
//!
//! [`RequestStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Open ──► Awarded ──► Completed
//!   └──► Cancelled
//! ```
//!
//! `Awarded`, `Completed` and `Cancelled` are terminal with respect to
//! bid selection; `Cancelled` is reachable from `Open` only. The only
//! path to `Completed` is releasing the escrow payment.
//!
//! [`PaymentStatus`] is linear:
//!
//! ```text
//! Pending ──► Held ──► Released
//!               └──► Refunded
//! ```
//!
//! `Refunded` is a defined terminal branch that no operation currently
//! exercises.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Accepting bids (while the bidding window is open).
    Open,
    /// A winning bid has been selected; awaiting payment + delivery.
    Awarded,
    /// Escrow released; project done.
    Completed,
    /// Withdrawn by the client before any award.
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Awarded => "awarded",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether moving `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: RequestStatus) -> bool {
        matches!(
            (self, to),
            (Self::Open, RequestStatus::Awarded)
                | (Self::Open, RequestStatus::Cancelled)
                | (Self::Awarded, RequestStatus::Completed)
        )
    }
}

/// Lifecycle status of an escrow payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created; checkout not yet confirmed by the gateway.
    Pending,
    /// Confirmed; funds held in escrow.
    Held,
    /// Paid out to the developer.
    Released,
    /// Returned to the client (terminal, unused by the core flows).
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Released => "released",
            Self::Refunded => "refunded",
        }
    }
}

/// Account role, chosen at onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    Client,
    Developer,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub bio: Option<String>,
    pub portfolio_url: Option<String>,
    pub created_at: i64,
}

/// A client's posted job, open for competing bids.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Request {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: Option<String>,
    pub status: RequestStatus,
    pub created_at: i64,
    /// End of the bidding window, fixed at creation; never extended.
    pub expires_at: i64,
    pub awarded_bid_id: Option<i64>,
    pub awarded_at: Option<i64>,
}

impl Request {
    /// Lazy expiry check: a request past its window rejects new and
    /// edited bids even while its stored status still reads `open`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// A developer's priced offer against a request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub request_id: i64,
    pub developer_id: i64,
    pub price: i64,
    pub message: Option<String>,
    pub estimated_days: Option<i64>,
    pub is_selected: bool,
    pub selected_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The escrow record for one awarded request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub request_id: i64,
    pub bid_id: i64,
    pub payer_id: i64,
    pub payee_id: i64,
    /// Copied from the winning bid's price at creation; never taken
    /// from caller input after that point.
    pub amount: i64,
    pub status: PaymentStatus,
    pub order_id: String,
    pub payment_key: Option<String>,
    pub paid_at: Option<i64>,
    pub released_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: Option<String>,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatRoom {
    pub id: i64,
    pub request_id: i64,
    pub client_id: i64,
    pub developer_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: i64,
}

/// What kind of entity an abuse report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReportTarget {
    User,
    Request,
    Message,
    Review,
}

impl ReportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Request => "request",
            Self::Message => "message",
            Self::Review => "review",
        }
    }
}

/// An abuse report filed against a user or a piece of content.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub target_type: ReportTarget,
    pub target_id: i64,
    pub reason: String,
    pub description: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub request_id: i64,
    pub reviewer_id: i64,
    pub reviewee_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: i64,
}
