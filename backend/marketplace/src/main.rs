//! Marketplace backend — entry point.
//!
//! Loads configuration, opens the SQLite pool (running migrations), and
//! serves the Axum REST API.

use std::sync::Arc;

use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use marketplace::api::{self, ApiState};
use marketplace::config::Config;
use marketplace::db;
use marketplace::email::Mailer;
use marketplace::gateway::TossGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // HTTP client shared between the payment gateway and the email sink.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let gateway = TossGateway::new(
        client.clone(),
        config.gateway_url.clone(),
        config.gateway_secret_key.clone(),
    );
    let mailer = Mailer::new(
        client,
        config.email_api_url.clone(),
        config.email_api_key.clone(),
        config.email_from.clone(),
        config.site_url.clone(),
    );

    let state = Arc::new(ApiState {
        pool,
        mailer,
        gateway: Arc::new(gateway),
        test_setup_token: config.test_setup_token.clone(),
        bid_window_hours: config.bid_window_hours,
    });

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
