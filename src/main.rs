// region:    --- Imports
use auction_bidding_service::bidding::engine::BidEngine;
use auction_bidding_service::config::EngineConfig;
use auction_bidding_service::handlers::{self, AppState};
use auction_bidding_service::notification::NotificationFanout;
use auction_bidding_service::push::PushHub;
use auction_bidding_service::scheduler::AuctionSweeper;
use auction_bidding_service::store::memory::{
    InMemoryAuctionStore, InMemoryAutoBidStore, InMemoryBidLedger, InMemoryNotificationStore,
};
use auction_bidding_service::store::{AuctionStore, AutoBidStore, BidLedger, NotificationStore};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드
    let config = EngineConfig::from_env();
    info!("{:<12} --> 설정 로드: {:?}", "Main", config);

    // 저장소 및 푸시 허브 생성
    let auctions: Arc<dyn AuctionStore> = Arc::new(InMemoryAuctionStore::new());
    let ledger: Arc<dyn BidLedger> = Arc::new(InMemoryBidLedger::new());
    let auto_bids: Arc<dyn AutoBidStore> = Arc::new(InMemoryAutoBidStore::new());
    let notifications: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
    let push = Arc::new(PushHub::new());

    // 팬아웃과 입찰 엔진 생성
    let fanout = NotificationFanout::new(Arc::clone(&notifications), Arc::clone(&push));
    let engine = Arc::new(BidEngine::new(
        Arc::clone(&auctions),
        Arc::clone(&ledger),
        Arc::clone(&auto_bids),
        fanout,
        Arc::clone(&push),
        config.clone(),
    ));

    // 만료 경매 정리 스케줄러 시작
    let sweeper = AuctionSweeper::new(Arc::clone(&engine), config.sweep_interval_secs);
    sweeper.start();
    info!("{:<12} --> 만료 경매 정리 스케줄러 시작", "Main");

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        engine,
        auctions,
        ledger,
        notifications,
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/bid", post(handlers::handle_bid))
        .route("/buy-now", post(handlers::handle_buy_now))
        .route(
            "/auto-bid",
            post(handlers::handle_register_auto_bid).delete(handlers::handle_delete_auto_bid),
        )
        .route("/auctions", post(handlers::handle_create_auction))
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route(
            "/auctions/:id/highest-bid",
            get(handlers::handle_get_highest_bid),
        )
        .route("/auctions/:id/bids", get(handlers::handle_get_bid_history))
        .route(
            "/notifications/:id",
            get(handlers::handle_get_notifications),
        )
        .route(
            "/notifications/:id/unread-count",
            get(handlers::handle_get_unread_count),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::handle_mark_read),
        )
        .route(
            "/notifications/:id/read-all",
            post(handlers::handle_mark_all_read),
        )
        .layer(cors)
        .with_state(state);

    // 리스너 생성
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
