//! Application configuration loaded from environment variables.

use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path / URL of the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Base URL of the card-payment gateway
    pub gateway_url: String,
    /// Secret key used for the gateway's Basic auth
    pub gateway_secret_key: String,
    /// API key for the outbound email sink; emails are skipped when unset
    pub email_api_key: Option<String>,
    /// Base URL of the email sink API
    pub email_api_url: String,
    /// From-address for outbound mail
    pub email_from: String,
    /// Public site URL used in notification links and email bodies
    pub site_url: String,
    /// Bearer token gating the e2e test-setup endpoint; endpoint is
    /// disabled when unset
    pub test_setup_token: Option<String>,
    /// Length of the bidding window, in hours
    pub bid_window_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./marketplace.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| Error::Config("Invalid API_PORT".to_string()))?,
            gateway_url: env_var("GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.tosspayments.com".to_string()),
            gateway_secret_key: env_var("GATEWAY_SECRET_KEY").map_err(|_| {
                Error::Config("GATEWAY_SECRET_KEY environment variable is required".to_string())
            })?,
            email_api_key: env_var("EMAIL_API_KEY").ok(),
            email_api_url: env_var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            email_from: env_var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@devmarket.example".to_string()),
            site_url: env_var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            test_setup_token: env_var("TEST_SETUP_TOKEN").ok(),
            bid_window_hours: env_var("BID_WINDOW_HOURS")
                .unwrap_or_else(|_| "48".to_string())
                .parse()
                .map_err(|_| Error::Config("Invalid BID_WINDOW_HOURS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Config(format!("Missing env var: {key}")))
}
