use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Auction {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub start_price: i64,
    pub buy_now_price: Option<i64>,
    /// 최소 입찰 단위 (> 0)
    pub bid_unit: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub auto_extend: bool,
    pub highest_bid: i64,
    pub bid_count: i64,
    pub is_closed: bool,
    pub winner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    /// 다음 입찰이 허용되는 최소 금액
    /// 첫 입찰은 시작가와 같아도 허용, 이후에는 최고가 + 입찰 단위
    pub fn min_next_bid(&self) -> i64 {
        if self.bid_count == 0 {
            self.start_price
        } else {
            self.highest_bid + self.bid_unit
        }
    }

    /// 진행 중 여부 (종료 처리 전이고 종료 시간 이전)
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        !self.is_closed && now >= self.start_time && now < self.end_time
    }
}
