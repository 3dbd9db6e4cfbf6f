//! Axum REST API — handlers, router, and shared state.
//!
//! Handlers call the service modules and, where a state transition
//! succeeded, fan out notifications afterwards. Fan-out helpers swallow
//! their own failures, so a notification or email problem never turns a
//! committed transition into an error response.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, CurrentUser};
use crate::errors::{Error, Result};
use crate::gateway::PaymentGateway;
use crate::models::{
    Bid, ChatRoom, Message, Notification, Payment, Report, Request, Review, UserRole,
};
use crate::requests::{NewRequest, UpdateRequest};
use crate::{award, bids, chat, contracts, email, notify, payments, reports, requests, reviews};

pub struct ApiState {
    pub pool: SqlitePool,
    pub mailer: email::Mailer,
    pub gateway: Arc<dyn PaymentGateway>,
    pub test_setup_token: Option<String>,
    pub bid_window_hours: i64,
}

/// Build the full application router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/test/setup", post(test_setup))
        .route("/me", get(me))
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request).patch(update_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/requests/:id/bids", post(submit_bid).get(list_bids))
        .route("/requests/:id/payments", post(create_payment))
        .route("/requests/:id/payment", get(get_payment))
        .route("/requests/:id/contract", get(get_contract))
        .route("/requests/:id/chat", post(open_chat))
        .route("/requests/:id/reviews", post(submit_review).get(list_reviews))
        .route("/bids/:id", patch(revise_bid).delete(withdraw_bid))
        .route("/bids/:id/select", post(select_bid))
        .route("/payments/confirm", post(confirm_payment))
        .route("/payments/:id/release", post(release_payment))
        .route("/me/requests", get(my_requests))
        .route("/me/bids", get(my_bids))
        .route("/me/notifications", get(my_notifications))
        .route("/me/notifications/unread-count", get(unread_count))
        .route("/me/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
        .route("/me/chat-rooms", get(my_chat_rooms))
        .route("/chat/:id/messages", get(list_messages).post(send_message))
        .route("/users/:id/reviews", get(user_reviews))
        .route("/reports", post(submit_report))
        .route("/me/reports", get(my_reports))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Health + identity
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// `GET /health`
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /me`
async fn me(State(state): State<Arc<ApiState>>, user: CurrentUser) -> Result<impl IntoResponse> {
    let profile = auth::get_profile(&state.pool, user.id).await?;
    Ok(Json(profile))
}

// ─────────────────────────────────────────────────────────
// Test setup (e2e provisioning, gated by TEST_SETUP_TOKEN)
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TestPersona {
    user_id: i64,
    email: String,
    token: String,
}

#[derive(Serialize)]
struct TestSetupResponse {
    client: TestPersona,
    developer: TestPersona,
}

/// `POST /test/setup`
///
/// Provisions a client + developer pair with sessions for end-to-end
/// runs. Disabled (404) unless `TEST_SETUP_TOKEN` is configured, and
/// callers must present that token as a bearer credential.
async fn test_setup(
    State(state): State<Arc<ApiState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse> {
    let expected = state
        .test_setup_token
        .as_deref()
        .ok_or(Error::NotFound("Not found"))?;
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    if provided != expected {
        return Err(Error::Unauthenticated);
    }

    let run_id = chrono::Utc::now().timestamp_millis();
    let client = provision_persona(&state.pool, "client", UserRole::Client, run_id).await?;
    let developer =
        provision_persona(&state.pool, "developer", UserRole::Developer, run_id).await?;

    Ok(Json(TestSetupResponse { client, developer }))
}

async fn provision_persona(
    pool: &SqlitePool,
    prefix: &str,
    role: UserRole,
    run_id: i64,
) -> Result<TestPersona> {
    let email = format!("e2e.{prefix}.{run_id}@example.com");
    let user_id = auth::create_profile(pool, &email, prefix, role).await?;
    let token = auth::create_session(pool, user_id).await?;
    Ok(TestPersona {
        user_id,
        email,
        token,
    })
}

// ─────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────

/// `POST /requests`
async fn create_request(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Json(body): Json<NewRequest>,
) -> Result<impl IntoResponse> {
    let request =
        requests::create_request(&state.pool, user.id, body, state.bid_window_hours).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /requests` — open, unexpired requests with bid counts.
async fn list_requests(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse> {
    let rows = requests::list_open_requests(&state.pool).await?;
    Ok(Json(rows))
}

#[derive(Serialize)]
struct RequestDetail {
    #[serde(flatten)]
    request: Request,
    bids: Vec<Bid>,
}

/// `GET /requests/:id`
async fn get_request(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let request = requests::get_request(&state.pool, id).await?;
    let bids = bids::list_bids_for_request(&state.pool, id).await?;
    Ok(Json(RequestDetail { request, bids }))
}

/// `PATCH /requests/:id`
async fn update_request(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRequest>,
) -> Result<impl IntoResponse> {
    let request = requests::update_request(&state.pool, user.id, id, body).await?;
    Ok(Json(request))
}

/// `POST /requests/:id/cancel`
async fn cancel_request(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    requests::cancel_request(&state.pool, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /me/requests`
async fn my_requests(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let rows = requests::list_my_requests(&state.pool, user.id).await?;
    Ok(Json(rows))
}

// ─────────────────────────────────────────────────────────
// Bids
// ─────────────────────────────────────────────────────────

/// `POST /requests/:id/bids`
async fn submit_bid(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(body): Json<bids::BidInput>,
) -> Result<impl IntoResponse> {
    let (bid, request) = bids::submit_bid(&state.pool, user.id, request_id, body).await?;

    // Post-commit, best-effort: tell the client and open the channel.
    let developer_name = auth::get_profile(&state.pool, user.id)
        .await
        .ok()
        .and_then(|p| p.name)
        .unwrap_or_else(|| "A developer".to_string());
    notify::new_bid(
        &state.pool,
        &state.mailer,
        request.client_id,
        request.id,
        &request.title,
        &developer_name,
        bid.price,
    )
    .await;
    if let Err(e) = chat::open_room(&state.pool, user.id, request.id, user.id).await {
        tracing::warn!(request_id = request.id, "failed to open chat room: {e}");
    }

    Ok((StatusCode::CREATED, Json(bid)))
}

/// `GET /requests/:id/bids`
async fn list_bids(
    State(state): State<Arc<ApiState>>,
    Path(request_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let rows = bids::list_bids_for_request(&state.pool, request_id).await?;
    Ok(Json(rows))
}

/// `PATCH /bids/:id`
async fn revise_bid(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(bid_id): Path<i64>,
    Json(body): Json<bids::BidInput>,
) -> Result<impl IntoResponse> {
    let bid = bids::revise_bid(&state.pool, user.id, bid_id, body).await?;
    Ok(Json(bid))
}

/// `DELETE /bids/:id`
async fn withdraw_bid(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(bid_id): Path<i64>,
) -> Result<impl IntoResponse> {
    bids::withdraw_bid(&state.pool, user.id, bid_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /me/bids`
async fn my_bids(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let rows = bids::list_my_bids(&state.pool, user.id).await?;
    Ok(Json(rows))
}

/// `POST /bids/:id/select` — the award transition.
async fn select_bid(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(bid_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let outcome = award::select_winning_bid(&state.pool, user.id, bid_id).await?;

    // Post-commit fan-out: winner first, then every losing bidder.
    let client_name = auth::get_profile(&state.pool, user.id)
        .await
        .ok()
        .and_then(|p| p.name)
        .unwrap_or_else(|| "The client".to_string());
    notify::awarded(
        &state.pool,
        &state.mailer,
        outcome.winning_bid.developer_id,
        outcome.request.id,
        &outcome.request.title,
        &client_name,
        outcome.winning_bid.price,
    )
    .await;
    for developer_id in &outcome.losing_developer_ids {
        notify::not_selected(
            &state.pool,
            *developer_id,
            outcome.request.id,
            &outcome.request.title,
        )
        .await;
    }

    Ok(Json(outcome.request))
}

// ─────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreatePaymentBody {
    bid_id: i64,
}

/// `POST /requests/:id/payments`
async fn create_payment(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<impl IntoResponse> {
    let checkout = payments::create_payment(&state.pool, user.id, request_id, body.bid_id).await?;
    Ok(Json(checkout))
}

#[derive(Deserialize)]
struct ConfirmPaymentBody {
    payment_key: String,
    order_id: String,
    amount: i64,
}

/// `POST /payments/confirm` — invoked after the gateway redirect.
async fn confirm_payment(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Json(body): Json<ConfirmPaymentBody>,
) -> Result<impl IntoResponse> {
    let payment = payments::confirm_payment(
        &state.pool,
        state.gateway.as_ref(),
        user.id,
        &body.payment_key,
        &body.order_id,
        body.amount,
    )
    .await?;

    let title = requests::get_request(&state.pool, payment.request_id)
        .await
        .map(|r| r.title)
        .unwrap_or_default();
    notify::payment_received(
        &state.pool,
        &state.mailer,
        payment.payee_id,
        payment.request_id,
        &title,
        payment.amount,
    )
    .await;

    Ok(Json(payment))
}

/// `POST /payments/:id/release`
async fn release_payment(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let payment = payments::release_payment(&state.pool, user.id, payment_id).await?;

    let title = requests::get_request(&state.pool, payment.request_id)
        .await
        .map(|r| r.title)
        .unwrap_or_default();
    notify::project_completed(
        &state.pool,
        &state.mailer,
        payment.payee_id,
        payment.request_id,
        &title,
        payment.amount,
    )
    .await;

    Ok(Json(payment))
}

/// `GET /requests/:id/payment` — payer and payee only.
async fn get_payment(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
) -> Result<Json<Option<Payment>>> {
    let payment = payments::get_payment_for_request(&state.pool, request_id).await?;
    match payment {
        Some(p) if p.payer_id != user.id && p.payee_id != user.id => {
            Err(Error::Forbidden("You are not a party to this payment"))
        }
        other => Ok(Json(other)),
    }
}

// ─────────────────────────────────────────────────────────
// Contract
// ─────────────────────────────────────────────────────────

/// `GET /requests/:id/contract`
async fn get_contract(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let data = contracts::contract_data(&state.pool, user.id, request_id).await?;
    Ok(Json(data))
}

// ─────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NotificationQuery {
    limit: Option<i64>,
}

/// `GET /me/notifications`
async fn my_notifications(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>> {
    let rows =
        notify::list_my_notifications(&state.pool, user.id, query.limit.unwrap_or(20)).await?;
    Ok(Json(rows))
}

#[derive(Serialize)]
struct UnreadCountResponse {
    count: i64,
}

/// `GET /me/notifications/unread-count`
async fn unread_count(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let count = notify::unread_count(&state.pool, user.id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// `POST /notifications/:id/read`
async fn mark_read(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    notify::mark_read(&state.pool, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /me/notifications/read-all`
async fn mark_all_read(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    notify::mark_all_read(&state.pool, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OpenChatBody {
    developer_id: i64,
}

/// `POST /requests/:id/chat`
async fn open_chat(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(body): Json<OpenChatBody>,
) -> Result<Json<ChatRoom>> {
    let room = chat::open_room(&state.pool, user.id, request_id, body.developer_id).await?;
    Ok(Json(room))
}

/// `GET /me/chat-rooms`
async fn my_chat_rooms(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
) -> Result<Json<Vec<ChatRoom>>> {
    let rooms = chat::list_rooms_for_user(&state.pool, user.id).await?;
    Ok(Json(rooms))
}

#[derive(Deserialize)]
struct SendMessageBody {
    content: String,
}

/// `GET /chat/:id/messages`
async fn list_messages(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<Message>>> {
    let rows = chat::list_messages(&state.pool, user.id, room_id).await?;
    Ok(Json(rows))
}

/// `POST /chat/:id/messages`
async fn send_message(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(room_id): Path<i64>,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse> {
    let message = chat::send_message(&state.pool, user.id, room_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ─────────────────────────────────────────────────────────
// Reviews
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SubmitReviewBody {
    reviewee_id: i64,
    rating: i64,
    comment: Option<String>,
}

/// `POST /requests/:id/reviews`
async fn submit_review(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(body): Json<SubmitReviewBody>,
) -> Result<impl IntoResponse> {
    let review = reviews::submit_review(
        &state.pool,
        user.id,
        request_id,
        body.reviewee_id,
        body.rating,
        body.comment.as_deref(),
    )
    .await?;

    notify::review_received(&state.pool, review.reviewee_id, request_id, review.rating).await;

    Ok((StatusCode::CREATED, Json(review)))
}

/// `GET /requests/:id/reviews`
async fn list_reviews(
    State(state): State<Arc<ApiState>>,
    Path(request_id): Path<i64>,
) -> Result<Json<Vec<Review>>> {
    let rows = reviews::list_reviews_for_request(&state.pool, request_id).await?;
    Ok(Json(rows))
}

/// `GET /users/:id/reviews`
async fn user_reviews(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let data = reviews::list_reviews_for_user(&state.pool, user_id).await?;
    Ok(Json(data))
}

// ─────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────

/// `POST /reports`
async fn submit_report(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
    Json(body): Json<reports::ReportInput>,
) -> Result<impl IntoResponse> {
    let report = reports::submit_report(&state.pool, user.id, body).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// `GET /me/reports`
async fn my_reports(
    State(state): State<Arc<ApiState>>,
    user: CurrentUser,
) -> Result<Json<Vec<Report>>> {
    let rows = reports::list_my_reports(&state.pool, user.id).await?;
    Ok(Json(rows))
}
