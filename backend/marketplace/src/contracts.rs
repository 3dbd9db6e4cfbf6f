//! Flattened contract view for an awarded request.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth;
use crate::bids;
use crate::errors::{Error, Result};
use crate::models::RequestStatus;
use crate::requests;

/// Everything the UI needs to render the contract document.
#[derive(Debug, Serialize)]
pub struct ContractData {
    pub request_id: i64,
    pub request_title: String,
    pub request_description: String,
    pub client_name: Option<String>,
    pub developer_name: Option<String>,
    pub price: i64,
    pub estimated_days: Option<i64>,
    pub deadline: Option<String>,
    pub awarded_at: Option<i64>,
}

/// Build the contract view. Participants only, awarded/completed only.
pub async fn contract_data(
    pool: &SqlitePool,
    user_id: i64,
    request_id: i64,
) -> Result<ContractData> {
    let request = requests::get_request(pool, request_id).await?;
    if !matches!(
        request.status,
        RequestStatus::Awarded | RequestStatus::Completed
    ) {
        return Err(Error::Conflict(
            "A contract exists only for awarded requests",
        ));
    }

    let awarded_bid_id = request
        .awarded_bid_id
        .ok_or(Error::NotFound("Awarded bid not found"))?;
    let bid = bids::get_bid(pool, awarded_bid_id).await?;

    if user_id != request.client_id && user_id != bid.developer_id {
        return Err(Error::Forbidden("Only contract parties can view it"));
    }

    let client = auth::get_profile(pool, request.client_id).await?;
    let developer = auth::get_profile(pool, bid.developer_id).await?;

    Ok(ContractData {
        request_id: request.id,
        request_title: request.title,
        request_description: request.description,
        client_name: client.name,
        developer_name: developer.name,
        price: bid.price,
        estimated_days: bid.estimated_days,
        deadline: request.deadline,
        awarded_at: request.awarded_at,
    })
}
