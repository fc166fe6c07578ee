/// HTTP 핸들러
/// 커맨드는 입찰 엔진으로, 조회는 저장소로 위임한다.
/// 타입이 있는 거절 사유를 `{"error", "code"}` 응답으로 변환하며
/// 저장소 예외를 그대로 흘리지 않는다.
// region:    --- Imports
use crate::auction::model::Auction;
use crate::bidding::commands::{
    BidRejection, BuyNowCommand, DeleteAutoBidCommand, EngineError, PlaceBidCommand,
    PlaceBidOutcome, RegisterAutoBidCommand,
};
use crate::bidding::engine::BidEngine;
use crate::query;
use crate::store::{AuctionStore, BidLedger, NotificationStore, StoreError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BidEngine>,
    pub auctions: Arc<dyn AuctionStore>,
    pub ledger: Arc<dyn BidLedger>,
    pub notifications: Arc<dyn NotificationStore>,
}
// endregion: --- App State

// region:    --- Error Mapping
fn rejection_body(rejection: &BidRejection) -> serde_json::Value {
    match rejection {
        BidRejection::BidTooLow { min_amount } => json!({
            "error": rejection.to_string(),
            "code": rejection.code(),
            "min_amount": min_amount,
        }),
        _ => json!({
            "error": rejection.to_string(),
            "code": rejection.code(),
        }),
    }
}

fn engine_error_response(e: EngineError) -> Response {
    match e {
        EngineError::Rejected(rejection) => {
            (StatusCode::BAD_REQUEST, Json(rejection_body(&rejection))).into_response()
        }
        EngineError::Conflict => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": e.to_string(),
                "code": "MAX_RETRIES_EXCEEDED",
            })),
        )
            .into_response(),
        EngineError::Store(store_error) => store_error_response(store_error),
    }
}

fn store_error_response(e: StoreError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": e.to_string(),
            "code": "STORE_UNAVAILABLE",
        })),
    )
        .into_response()
}
// endregion: --- Error Mapping

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_bid(
    State(state): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    match state.engine.place_bid(cmd, Utc::now()).await {
        Ok(PlaceBidOutcome::Accepted(accepted)) => (
            StatusCode::OK,
            Json(json!({
                "message": "입찰이 성공적으로 처리되었습니다.",
                "current_price": accepted.new_highest,
                "bid_count": accepted.bid_count,
                "extended": accepted.extended,
                "end_time": accepted.end_time,
            })),
        )
            .into_response(),
        Ok(PlaceBidOutcome::BuyNowExecuted { price }) => (
            StatusCode::OK,
            Json(json!({
                "message": "즉시 구매 가격에 도달하여 낙찰 처리되었습니다.",
                "price": price,
            })),
        )
            .into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// 즉시 구매 요청 처리
pub async fn handle_buy_now(
    State(state): State<AppState>,
    Json(cmd): Json<BuyNowCommand>,
) -> impl IntoResponse {
    match state.engine.buy_now(cmd, Utc::now()).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "message": "즉시 구매가 성공적으로 처리되었습니다.",
                "price": outcome.price,
                "winner_id": outcome.winner_id,
            })),
        )
            .into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// 자동 입찰 상한 등록
pub async fn handle_register_auto_bid(
    State(state): State<AppState>,
    Json(cmd): Json<RegisterAutoBidCommand>,
) -> impl IntoResponse {
    match state.engine.register_auto_bid(cmd, Utc::now()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": "자동 입찰이 등록되었습니다."})),
        )
            .into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// 자동 입찰 상한 해제
pub async fn handle_delete_auto_bid(
    State(state): State<AppState>,
    Json(cmd): Json<DeleteAutoBidCommand>,
) -> impl IntoResponse {
    match state.engine.delete_auto_bid(cmd).await {
        Ok(deleted) => (StatusCode::OK, Json(json!({"deleted": deleted}))).into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// 경매 등록 요청 (판매자)
#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    pub seller_id: i64,
    pub title: String,
    pub start_price: i64,
    pub buy_now_price: Option<i64>,
    pub bid_unit: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub auto_extend: bool,
}

/// 경매 등록 처리
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 등록 요청: {:?}", "Command", req);

    if req.bid_unit <= 0 || req.start_price <= 0 || req.end_time <= req.start_time {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "경매 등록 정보가 올바르지 않습니다.",
                "code": "INVALID_AUCTION",
            })),
        )
            .into_response();
    }

    let now = Utc::now();
    let auction = Auction {
        id: 0,
        seller_id: req.seller_id,
        title: req.title,
        start_price: req.start_price,
        buy_now_price: req.buy_now_price,
        bid_unit: req.bid_unit,
        start_time: req.start_time,
        end_time: req.end_time,
        auto_extend: req.auto_extend,
        highest_bid: req.start_price,
        bid_count: 0,
        is_closed: false,
        winner_id: None,
        created_at: now,
    };

    match state.auctions.insert(auction).await {
        Ok(auction_id) => (StatusCode::OK, Json(json!({"auction_id": auction_id}))).into_response(),
        Err(e) => store_error_response(e),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 상태 조회
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    match query::get_auction_state(state.auctions.as_ref(), auction_id).await {
        Ok(Some(auction)) => Json(auction).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "경매를 찾을 수 없습니다.",
                "code": "NOT_FOUND",
            })),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    match query::get_highest_bid(state.ledger.as_ref(), auction_id).await {
        Ok(highest) => Json(json!({"highest_bid": highest})).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    match query::get_bid_history(state.ledger.as_ref(), auction_id).await {
        Ok(bids) => Json(bids).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 알림 목록 조회
pub async fn handle_get_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    match query::get_notifications(state.notifications.as_ref(), user_id).await {
        Ok(notifications) => Json(notifications).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 미확인 알림 개수 조회
pub async fn handle_get_unread_count(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    match query::get_unread_count(state.notifications.as_ref(), user_id).await {
        Ok(count) => Json(json!({"unread": count})).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 알림 읽음 처리 (멱등)
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
) -> impl IntoResponse {
    match state.notifications.mark_read(notification_id).await {
        Ok(true) => (StatusCode::OK, Json(json!({"message": "읽음 처리되었습니다."})))
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "알림을 찾을 수 없습니다.",
                "code": "NOT_FOUND",
            })),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 수신자 알림 전체 읽음 처리 (멱등)
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    match state.notifications.mark_all_read(user_id).await {
        Ok(updated) => (StatusCode::OK, Json(json!({"updated": updated}))).into_response(),
        Err(e) => store_error_response(e),
    }
}

// endregion: --- Query Handlers
