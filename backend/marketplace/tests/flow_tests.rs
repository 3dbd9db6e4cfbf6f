//! Cross-cutting flows: request listing, reviews, chat, notifications,
//! and the contract view.

mod common;

use common::{create_open_request, create_user, force_expire, setup_pool};
use marketplace::bids::{self, BidInput};
use marketplace::errors::Error;
use marketplace::models::{ReportTarget, UserRole};
use marketplace::reports::{self, ReportInput};
use marketplace::requests::{self, NewRequest};
use marketplace::{award, chat, contracts, notify, reviews};

fn bid(price: i64) -> BidInput {
    BidInput {
        price,
        message: None,
        estimated_days: Some(10),
    }
}

#[tokio::test]
async fn test_request_validation() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;

    let mut new = NewRequest {
        title: "Tiny".into(),
        description: "A description long enough to pass the check.".into(),
        budget_min: 100,
        budget_max: 200,
        deadline: None,
    };
    let err = requests::create_request(&pool, client, new.clone(), 48)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));

    new.title = "A proper title".into();
    new.budget_min = 300;
    let err = requests::create_request(&pool, client, new.clone(), 48)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));

    new.budget_min = 100;
    let request = requests::create_request(&pool, client, new, 48)
        .await
        .unwrap();
    assert_eq!(request.expires_at, request.created_at + 48 * 3600);
}

#[tokio::test]
async fn test_open_listing_hides_expired_requests() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let live = create_open_request(&pool, client).await;
    let lapsed = create_open_request(&pool, client).await;
    force_expire(&pool, lapsed.id).await;

    bids::submit_bid(&pool, dev, live.id, bid(700_000))
        .await
        .unwrap();

    let listed = requests::list_open_requests(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].request.id, live.id);
    assert_eq!(listed[0].bid_count, 1);
}

#[tokio::test]
async fn test_reviews_after_award() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let outsider = create_user(&pool, "o@example.com", "Outsider", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;
    let (placed, _) = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();

    // No review before award.
    let err = reviews::submit_review(&pool, client, request.id, dev, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    award::select_winning_bid(&pool, client, placed.id)
        .await
        .unwrap();

    // Rating bounds.
    let err = reviews::submit_review(&pool, client, request.id, dev, 6, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));

    // Only the counterparty can be reviewed.
    let err = reviews::submit_review(&pool, client, request.id, client, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));

    // Outsiders cannot review at all.
    let err = reviews::submit_review(&pool, outsider, request.id, dev, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let review = reviews::submit_review(&pool, client, request.id, dev, 5, Some("Great work"))
        .await
        .unwrap();
    assert_eq!(review.rating, 5);

    // One review per reviewer per request.
    let err = reviews::submit_review(&pool, client, request.id, dev, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // The developer reviews back, and the aggregate reflects both.
    reviews::submit_review(&pool, dev, request.id, client, 4, None)
        .await
        .unwrap();
    let received = reviews::list_reviews_for_user(&pool, dev).await.unwrap();
    assert_eq!(received.reviews.len(), 1);
    assert_eq!(received.average_rating, Some(5.0));
}

#[tokio::test]
async fn test_chat_room_reuse_and_access() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let outsider = create_user(&pool, "o@example.com", "Outsider", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let room = chat::open_room(&pool, dev, request.id, dev).await.unwrap();
    let again = chat::open_room(&pool, client, request.id, dev).await.unwrap();
    assert_eq!(room.id, again.id);

    let err = chat::open_room(&pool, outsider, request.id, dev)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    chat::send_message(&pool, client, room.id, "Hello!").await.unwrap();
    let err = chat::send_message(&pool, client, room.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    let err = chat::send_message(&pool, outsider, room.id, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let messages = chat::list_messages(&pool, dev, room.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "Hello!");
}

#[tokio::test]
async fn test_notification_read_tracking() {
    let pool = setup_pool().await;
    let user = create_user(&pool, "u@example.com", "User", UserRole::Developer).await;

    notify::create_notification(&pool, user, "awarded", "You won", None, Some("/requests/1"))
        .await
        .unwrap();
    notify::create_notification(&pool, user, "new_bid", "New bid", None, None)
        .await
        .unwrap();

    assert_eq!(notify::unread_count(&pool, user).await.unwrap(), 2);

    let listed = notify::list_my_notifications(&pool, user, 20).await.unwrap();
    assert_eq!(listed.len(), 2);
    notify::mark_read(&pool, user, listed[0].id).await.unwrap();
    assert_eq!(notify::unread_count(&pool, user).await.unwrap(), 1);

    notify::mark_all_read(&pool, user).await.unwrap();
    assert_eq!(notify::unread_count(&pool, user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_contract_view_for_parties_only() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let outsider = create_user(&pool, "o@example.com", "Outsider", UserRole::Client).await;
    let request = create_open_request(&pool, client).await;
    let (placed, _) = bids::submit_bid(&pool, dev, request.id, bid(900_000))
        .await
        .unwrap();

    let err = contracts::contract_data(&pool, client, request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    award::select_winning_bid(&pool, client, placed.id)
        .await
        .unwrap();

    let data = contracts::contract_data(&pool, dev, request.id).await.unwrap();
    assert_eq!(data.price, 900_000);
    assert_eq!(data.developer_name.as_deref(), Some("Dev"));

    let err = contracts::contract_data(&pool, outsider, request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_update_request_rules() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let update = marketplace::requests::UpdateRequest {
        title: "Build a better bot".into(),
        description: "An updated description that is still long enough.".into(),
        budget_min: 600_000,
        budget_max: 1_200_000,
        deadline: Some("2026-10-01".into()),
    };

    let err = requests::update_request(&pool, dev, request.id, update.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let updated = requests::update_request(&pool, client, request.id, update.clone())
        .await
        .unwrap();
    assert_eq!(updated.title, "Build a better bot");
    // The bidding window is fixed at creation and never extended.
    assert_eq!(updated.expires_at, request.expires_at);

    let (placed, _) = bids::submit_bid(&pool, dev, request.id, bid(700_000))
        .await
        .unwrap();
    award::select_winning_bid(&pool, client, placed.id)
        .await
        .unwrap();
    let err = requests::update_request(&pool, client, request.id, update)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_report_once_per_target() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;
    let request = create_open_request(&pool, client).await;

    let report = reports::submit_report(
        &pool,
        dev,
        ReportInput {
            target_type: ReportTarget::Request,
            target_id: request.id,
            reason: "Spam".into(),
            description: Some("Reposted ad".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(report.reporter_id, dev);
    assert_eq!(report.target_type, ReportTarget::Request);

    // Same reporter, same target: rejected.
    let err = reports::submit_report(
        &pool,
        dev,
        ReportInput {
            target_type: ReportTarget::Request,
            target_id: request.id,
            reason: "Spam again".into(),
            description: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // A different target is a distinct report.
    reports::submit_report(
        &pool,
        dev,
        ReportInput {
            target_type: ReportTarget::User,
            target_id: client,
            reason: "Abusive messages".into(),
            description: None,
        },
    )
    .await
    .unwrap();

    let mine = reports::list_my_reports(&pool, dev).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(reports::list_my_reports(&pool, client)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_report_requires_a_reason() {
    let pool = setup_pool().await;
    let client = create_user(&pool, "c@example.com", "Client", UserRole::Client).await;
    let dev = create_user(&pool, "d@example.com", "Dev", UserRole::Developer).await;

    let err = reports::submit_report(
        &pool,
        dev,
        ReportInput {
            target_type: ReportTarget::User,
            target_id: client,
            reason: "   ".into(),
            description: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}
