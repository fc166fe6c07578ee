use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 경매 채널(`auction.<id>.updates`)로 발행되는 실시간 이벤트
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 입찰 이벤트 (자동 입찰 포함)
    BidPlaced {
        auction_id: i64,
        bidder_id: i64,
        bid_amount: i64,
        synthetic: bool,
        end_time: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    // 즉시 구매 이벤트
    BuyNowExecuted {
        auction_id: i64,
        buyer_id: i64,
        price: i64,
        timestamp: DateTime<Utc>,
    },
    // 경매 종료 이벤트
    AuctionClosed {
        auction_id: i64,
        winner_id: Option<i64>,
        final_price: i64,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    /// 이벤트가 속한 경매의 구독 토픽
    pub fn topic(&self) -> String {
        let auction_id = match self {
            AuctionEvent::BidPlaced { auction_id, .. } => auction_id,
            AuctionEvent::BuyNowExecuted { auction_id, .. } => auction_id,
            AuctionEvent::AuctionClosed { auction_id, .. } => auction_id,
        };
        format!("auction.{}.updates", auction_id)
    }
}
