//! Shared test fixtures: an in-memory database pool and scripted
//! collaborators for the payment gateway.
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use marketplace::auth;
use marketplace::errors::{Error, Result};
use marketplace::gateway::PaymentGateway;
use marketplace::models::{Request, UserRole};
use marketplace::requests::{self, NewRequest};

/// Fresh in-memory database with migrations applied. The pool is capped
/// at a single connection so every caller sees the same `:memory:` file.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

pub async fn create_user(pool: &SqlitePool, email: &str, name: &str, role: UserRole) -> i64 {
    auth::create_profile(pool, email, name, role)
        .await
        .expect("create profile")
}

pub async fn create_open_request(pool: &SqlitePool, client_id: i64) -> Request {
    requests::create_request(
        pool,
        client_id,
        NewRequest {
            title: "Build a chat bot".into(),
            description: "A scoped description long enough to pass validation.".into(),
            budget_min: 500_000,
            budget_max: 1_500_000,
            deadline: None,
        },
        48,
    )
    .await
    .expect("create request")
}

/// Move a request's bidding window into the past without touching its
/// stored status, mimicking a lapsed window nobody has acted on.
pub async fn force_expire(pool: &SqlitePool, request_id: i64) {
    sqlx::query("UPDATE requests SET expires_at = 0 WHERE id = ?1")
        .bind(request_id)
        .execute(pool)
        .await
        .expect("expire request");
}

/// Scripted gateway: records every confirm call and can be told to
/// reject the next one.
#[derive(Default)]
pub struct MockGateway {
    pub fail_with: Mutex<Option<String>>,
    pub confirms: Mutex<Vec<(String, String, i64)>>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn confirm(&self, payment_key: &str, order_id: &str, amount: i64) -> Result<()> {
        if let Some(message) = self.fail_with.lock().unwrap().take() {
            return Err(Error::Gateway(message));
        }
        self.confirms
            .lock()
            .unwrap()
            .push((payment_key.to_string(), order_id.to_string(), amount));
        Ok(())
    }
}
