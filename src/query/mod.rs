/// 조회 핸들러
/// 집계/원장/알림 저장소에 대한 읽기 전용 접근
// region:    --- Imports
use crate::auction::model::Auction;
use crate::bidding::model::Bid;
use crate::notification::Notification;
use crate::store::{AuctionStore, BidLedger, NotificationStore, StoreError};
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 경매 상태 조회
pub async fn get_auction_state(
    auctions: &dyn AuctionStore,
    auction_id: i64,
) -> Result<Option<Auction>, StoreError> {
    info!("{:<12} --> 경매 상태 조회 id: {}", "Query", auction_id);
    Ok(auctions.get(auction_id).await?.map(|v| v.auction))
}

/// 입찰 이력 조회 (원장 순서)
pub async fn get_bid_history(
    ledger: &dyn BidLedger,
    auction_id: i64,
) -> Result<Vec<Bid>, StoreError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    ledger.list_by_auction(auction_id).await
}

/// 최고 입찰가 조회
pub async fn get_highest_bid(
    ledger: &dyn BidLedger,
    auction_id: i64,
) -> Result<Option<i64>, StoreError> {
    info!("{:<12} --> 최고 입찰가 조회 id: {}", "Query", auction_id);
    ledger.highest_bid(auction_id).await
}

/// 수신자별 알림 목록 조회
pub async fn get_notifications(
    notifications: &dyn NotificationStore,
    user_id: i64,
) -> Result<Vec<Notification>, StoreError> {
    info!("{:<12} --> 알림 목록 조회 user: {}", "Query", user_id);
    notifications.list_by_recipient(user_id).await
}

/// 미확인 알림 개수 조회
pub async fn get_unread_count(
    notifications: &dyn NotificationStore,
    user_id: i64,
) -> Result<i64, StoreError> {
    info!("{:<12} --> 미확인 알림 개수 조회 user: {}", "Query", user_id);
    notifications.count_unread(user_id).await
}

// endregion: --- Query Handlers
