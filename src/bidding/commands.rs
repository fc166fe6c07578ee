/// 입찰 관련 커맨드와 처리 결과 타입
/// 1. 입찰
/// 2. 즉시 구매
/// 3. 자동 입찰 상한 등록/해제
// region:    --- Imports
use crate::store::StoreError;
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub bid_amount: i64,
}

/// 즉시 구매 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BuyNowCommand {
    pub auction_id: i64,
    pub buyer_id: i64,
}

/// 자동 입찰 상한 등록 명령 (기존 상한이 있으면 교체)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterAutoBidCommand {
    pub auction_id: i64,
    pub user_id: i64,
    pub max_amount: i64,
}

/// 자동 입찰 상한 해제 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeleteAutoBidCommand {
    pub auction_id: i64,
    pub user_id: i64,
}
// endregion: --- Commands

// region:    --- Outcomes
/// 입찰 수락 결과
#[derive(Debug, Serialize, Clone)]
pub struct BidAccepted {
    pub new_highest: i64,
    pub bid_count: i64,
    /// 자동 연장 발동 여부
    pub extended: bool,
    pub end_time: chrono::DateTime<chrono::Utc>,
}

/// 입찰 처리 결과
/// 즉시 구매 가격 이상의 입찰은 즉시 구매로 전환된다.
#[derive(Debug, Serialize, Clone)]
pub enum PlaceBidOutcome {
    Accepted(BidAccepted),
    BuyNowExecuted { price: i64 },
}

/// 즉시 구매 결과
#[derive(Debug, Serialize, Clone)]
pub struct BuyNowOutcome {
    pub price: i64,
    pub winner_id: i64,
}

/// 경매 종료 결과
#[derive(Debug, Serialize, Clone)]
pub struct CloseOutcome {
    pub auction_id: i64,
    pub winner_id: Option<i64>,
    pub final_price: i64,
    /// 이미 종료된 경매였는지 (멱등 재호출)
    pub already_closed: bool,
}
// endregion: --- Outcomes

// region:    --- Errors
/// 검증 거절 사유
/// 호출자에게 동기적으로 반환되며 재시도되지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum BidRejection {
    #[error("경매를 찾을 수 없습니다.")]
    AuctionNotFound,
    #[error("경매가 아직 시작되지 않았습니다.")]
    AuctionNotStarted,
    #[error("경매가 이미 종료되었습니다.")]
    AuctionClosed,
    #[error("경매 시간이 만료되었습니다.")]
    AuctionExpired,
    #[error("아직 종료 시각이 지나지 않은 경매입니다.")]
    AuctionNotExpired,
    #[error("입찰 금액이 최소 입찰가보다 낮습니다.")]
    BidTooLow { min_amount: i64 },
    #[error("판매자는 자신의 경매에 입찰할 수 없습니다.")]
    SelfBid,
    #[error("즉시 구매가 설정되지 않은 경매입니다.")]
    BuyNowUnavailable,
    #[error("자동 입찰 상한은 0보다 커야 합니다.")]
    InvalidMaxAmount,
}

impl BidRejection {
    /// 응답 바디에 실리는 거절 코드
    pub fn code(&self) -> &'static str {
        match self {
            BidRejection::AuctionNotFound => "NOT_FOUND",
            BidRejection::AuctionNotStarted => "NOT_STARTED",
            BidRejection::AuctionClosed => "ALREADY_CLOSED",
            BidRejection::AuctionExpired => "EXPIRED",
            BidRejection::AuctionNotExpired => "NOT_EXPIRED",
            BidRejection::BidTooLow { .. } => "LOW_BID",
            BidRejection::SelfBid => "SELF_BID",
            BidRejection::BuyNowUnavailable => "BUY_NOW_UNAVAILABLE",
            BidRejection::InvalidMaxAmount => "INVALID_MAX_AMOUNT",
        }
    }
}

/// 엔진 오류
/// 거절은 호출자가 수정 후 재제출 가능, 충돌은 일시적 실패,
/// 저장소 오류는 연산 전체 실패 (부분 반영 없음)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Rejected(#[from] BidRejection),
    #[error("동시 업데이트 충돌로 최대 재시도 횟수를 초과했습니다.")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}
// endregion: --- Errors
