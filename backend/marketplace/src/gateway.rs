//! External card-payment gateway client.
//!
//! The escrow flow only ever confirms with the server-stored amount;
//! this module is the one place that talks to the gateway's HTTP API.
//! It sits behind a trait so tests can substitute a scripted gateway.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{Error, Result};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Confirm a checkout with the gateway. `amount` must be the
    /// server-held payment amount.
    async fn confirm(&self, payment_key: &str, order_id: &str, amount: i64) -> Result<()>;
}

/// Toss Payments confirm endpoint (`POST /v1/payments/confirm`), using
/// Basic auth with the secret key as username and an empty password.
pub struct TossGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct GatewayErrorBody {
    message: Option<String>,
}

impl TossGateway {
    pub fn new(client: Client, base_url: String, secret_key: String) -> Self {
        Self {
            client,
            base_url,
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentGateway for TossGateway {
    async fn confirm(&self, payment_key: &str, order_id: &str, amount: i64) -> Result<()> {
        let auth = BASE64.encode(format!("{}:", self.secret_key));
        let response = self
            .client
            .post(format!("{}/v1/payments/confirm", self.base_url))
            .header("Authorization", format!("Basic {auth}"))
            .json(&json!({
                "paymentKey": payment_key,
                "orderId": order_id,
                "amount": amount,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let message = response
            .json::<GatewayErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "Payment confirmation failed".to_string());
        Err(Error::Gateway(message))
    }
}
