/// 만료 경매 정리 스케줄러
/// 주기적으로 종료 시간이 지난 경매를 찾아 종료 처리한다.
/// 마감 직전 입찰과는 경매별 락으로 상호 배제된다.
// region:    --- Imports
use crate::bidding::engine::BidEngine;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Sweeper
pub struct AuctionSweeper {
    engine: Arc<BidEngine>,
    interval_secs: u64,
}

impl AuctionSweeper {
    pub fn new(engine: Arc<BidEngine>, interval_secs: u64) -> Self {
        Self {
            engine,
            interval_secs,
        }
    }

    /// 스케줄러 시작
    pub fn start(&self) {
        let engine = Arc::clone(&self.engine);
        let mut ticker = interval(Duration::from_secs(self.interval_secs.max(1)));
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                match engine.close_expired_auctions(Utc::now()).await {
                    Ok(closed) if !closed.is_empty() => {
                        debug!(
                            "{:<12} --> 만료 경매 {}건 종료 처리",
                            "Scheduler",
                            closed.len()
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("{:<12} --> 만료 경매 정리 중 오류 발생: {:?}", "Scheduler", e);
                    }
                }
            }
        });
    }
}
// endregion: --- Auction Sweeper
