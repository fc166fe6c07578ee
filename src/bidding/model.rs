use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 입찰 모델
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bid {
    /// 경매별 원장 순번 (원장 추가 시 부여)
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    /// 자동 입찰 엔진이 생성한 대리 입찰 여부
    pub synthetic: bool,
    pub bid_time: DateTime<Utc>,
}

// 자동 입찰 상한 모델
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AutoBid {
    pub auction_id: i64,
    pub user_id: i64,
    pub max_amount: i64,
    pub created_at: DateTime<Utc>,
}
