/// 협력 저장소 트레이트
/// 코어는 저장 기술을 규정하지 않는다. 실제 배치에서는 DB가 이 계약을
/// 구현하고, 기본 제공되는 인메모리 구현은 테스트와 단일 프로세스 운용에 쓰인다.
// region:    --- Imports
use crate::auction::model::Auction;
use crate::bidding::model::{AutoBid, Bid};
use crate::notification::{Notification, NotificationType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// endregion: --- Imports

pub mod memory;

// region:    --- Errors
/// 저장소 오류
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("저장소 사용 불가: {0}")]
    Unavailable(String),
}
// endregion: --- Errors

// region:    --- Auction Store
/// 버전이 붙은 경매 레코드 (낙관적 업데이트용)
#[derive(Debug, Clone)]
pub struct VersionedAuction {
    pub auction: Auction,
    pub version: i64,
}

/// compare_and_update 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Conflict,
}

/// 경매 집계 상태 저장소
/// 집계 갱신과 원장 추가는 하나의 원자 단위여야 한다. 인메모리 구현은
/// 엔진의 경매별 락 아래에서 호출되는 것으로 이를 보장하고, DB 구현은
/// 트랜잭션으로 보장해야 한다.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn insert(&self, auction: Auction) -> Result<i64, StoreError>;
    async fn get(&self, auction_id: i64) -> Result<Option<VersionedAuction>, StoreError>;
    /// 읽어둔 버전이 그대로일 때만 갱신
    async fn compare_and_update(
        &self,
        auction_id: i64,
        expected_version: i64,
        updated: Auction,
    ) -> Result<CommitOutcome, StoreError>;
    /// 종료 시간이 지났지만 아직 종료 처리되지 않은 경매 목록
    async fn list_open_expired(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError>;
}
// endregion: --- Auction Store

// region:    --- Bid Ledger
/// 입찰 원장 (경매별 추가 전용, 순서 보장)
#[async_trait]
pub trait BidLedger: Send + Sync {
    /// 원장에 추가하고 경매별 순번을 부여해 돌려준다
    async fn append(&self, bid: Bid) -> Result<i64, StoreError>;
    async fn list_by_auction(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError>;
    async fn highest_bid(&self, auction_id: i64) -> Result<Option<i64>, StoreError>;
}
// endregion: --- Bid Ledger

// region:    --- AutoBid Store
/// 자동 입찰 상한 저장소
/// (경매, 사용자)당 활성 상한은 하나, 재등록은 교체
#[async_trait]
pub trait AutoBidStore: Send + Sync {
    async fn upsert(
        &self,
        auction_id: i64,
        user_id: i64,
        max_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    /// 상한 해제, 실제로 지워졌으면 true
    async fn delete(&self, auction_id: i64, user_id: i64) -> Result<bool, StoreError>;
    async fn list_active(&self, auction_id: i64) -> Result<Vec<AutoBid>, StoreError>;
}
// endregion: --- AutoBid Store

// region:    --- Notification Store
/// 알림 저장 요청
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub auction_id: Option<i64>,
    pub kind: NotificationType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// 알림 저장소
/// 미확인 개수는 언제나 읽지 않은 레코드 집합에서 계산한다 (별도 카운터 금지)
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn append(&self, notification: NewNotification) -> Result<Notification, StoreError>;
    async fn list_by_recipient(&self, user_id: i64) -> Result<Vec<Notification>, StoreError>;
    async fn count_unread(&self, user_id: i64) -> Result<i64, StoreError>;
    /// 읽음 처리 (멱등), 해당 알림이 존재하면 true
    async fn mark_read(&self, notification_id: i64) -> Result<bool, StoreError>;
    /// 수신자의 모든 알림 읽음 처리 (멱등), 새로 읽음 처리된 개수 반환
    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError>;
}
// endregion: --- Notification Store
