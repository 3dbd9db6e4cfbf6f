//! Bid registry rules: validation, uniqueness, window gating, and the
//! selected-bid freeze.

mod common;

use common::{create_open_request, create_user, force_expire, setup_pool};
use marketplace::award;
use marketplace::bids::{self, BidInput};
use marketplace::errors::Error;
use marketplace::models::UserRole;
use marketplace::requests;

fn bid(price: i64) -> BidInput {
    BidInput {
        price,
        message: Some("I can build this".into()),
        estimated_days: Some(14),
    }
}

#[tokio::test]
async fn test_submit_bid_happy_path() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let (placed, parent) = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();
    assert_eq!(placed.request_id, request.id);
    assert_eq!(placed.price, 900_000);
    assert!(!placed.is_selected);
    assert_eq!(parent.id, request.id);
}

#[tokio::test]
async fn test_bid_price_must_be_positive() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let err = bids::submit_bid(&pool, dev, request.id, bid(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));

    let mut input = bid(1000);
    input.estimated_days = Some(0);
    let err = bids::submit_bid(&pool, dev, request.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_owner_cannot_bid_on_own_request() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let request = create_open_request(&pool, client).await;

    let err = bids::submit_bid(&pool, client, request.id, bid(900_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_one_bid_per_developer_per_request() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();
    let err = bids::submit_bid(&pool, dev, request.id, bid(950_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Still exactly one bid on record.
    let all = bids::list_bids_for_request(&pool, request.id).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_expired_window_rejects_bids_while_status_still_open() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;
    force_expire(&pool, request.id).await;

    // Stored status still reads open; the lazy check closes the door.
    let stored = requests::get_request(&pool, request.id).await.unwrap();
    assert_eq!(stored.status.as_str(), "open");

    let err = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_cancelled_request_rejects_bids() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    requests::cancel_request(&pool, client, request.id)
        .await
        .unwrap();
    let err = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_revise_and_withdraw_before_selection() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let (placed, _) = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();

    let revised = bids::revise_bid(&pool, dev, placed.id, bid(850_000))
        .await
        .unwrap();
    assert_eq!(revised.price, 850_000);

    bids::withdraw_bid(&pool, dev, placed.id).await.unwrap();
    assert!(matches!(
        bids::get_bid(&pool, placed.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_revise_requires_ownership() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let other = create_user(&pool, "o@example.com", "Other", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let (placed, _) = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();
    let err = bids::revise_bid(&pool, other, placed.id, bid(800_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_selected_bid_is_frozen() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let (placed, _) = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();
    award::select_winning_bid(&pool, client, placed.id)
        .await
        .unwrap();

    let err = bids::revise_bid(&pool, dev, placed.id, bid(800_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = bids::withdraw_bid(&pool, dev, placed.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}
