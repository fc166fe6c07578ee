use auction_bidding_service::auction::model::Auction;
use auction_bidding_service::bidding::commands::{
    BidRejection, BuyNowCommand, DeleteAutoBidCommand, EngineError, PlaceBidCommand,
    PlaceBidOutcome, RegisterAutoBidCommand,
};
use auction_bidding_service::bidding::engine::BidEngine;
use auction_bidding_service::config::EngineConfig;
use auction_bidding_service::notification::{Notification, NotificationFanout, NotificationType};
use auction_bidding_service::push::PushHub;
use auction_bidding_service::store::memory::{
    InMemoryAuctionStore, InMemoryAutoBidStore, InMemoryBidLedger, InMemoryNotificationStore,
};
use auction_bidding_service::store::{AuctionStore, AutoBidStore, BidLedger, NotificationStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// 테스트 하네스: 인메모리 저장소 위에 올린 엔진
struct Harness {
    engine: Arc<BidEngine>,
    auctions: Arc<dyn AuctionStore>,
    ledger: Arc<dyn BidLedger>,
    notifications: Arc<dyn NotificationStore>,
    push: Arc<PushHub>,
}

fn setup() -> Harness {
    setup_with_config(EngineConfig::default())
}

fn setup_with_config(config: EngineConfig) -> Harness {
    let auctions: Arc<dyn AuctionStore> = Arc::new(InMemoryAuctionStore::new());
    let ledger: Arc<dyn BidLedger> = Arc::new(InMemoryBidLedger::new());
    let auto_bids: Arc<dyn AutoBidStore> = Arc::new(InMemoryAutoBidStore::new());
    let notifications: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
    let push = Arc::new(PushHub::new());
    let fanout = NotificationFanout::new(Arc::clone(&notifications), Arc::clone(&push));
    let engine = Arc::new(BidEngine::new(
        Arc::clone(&auctions),
        Arc::clone(&ledger),
        Arc::clone(&auto_bids),
        fanout,
        Arc::clone(&push),
        config,
    ));
    Harness {
        engine,
        auctions,
        ledger,
        notifications,
        push,
    }
}

/// 테스트용 경매 생성
async fn create_auction(
    harness: &Harness,
    seller_id: i64,
    start_price: i64,
    buy_now_price: Option<i64>,
    bid_unit: i64,
    end_time: DateTime<Utc>,
    auto_extend: bool,
) -> i64 {
    let now = Utc::now();
    harness
        .auctions
        .insert(Auction {
            id: 0,
            seller_id,
            title: "테스트 상품".to_string(),
            start_price,
            buy_now_price,
            bid_unit,
            start_time: now - Duration::hours(1),
            end_time,
            auto_extend,
            highest_bid: start_price,
            bid_count: 0,
            is_closed: false,
            winner_id: None,
            created_at: now,
        })
        .await
        .expect("경매 생성 실패")
}

fn bid(auction_id: i64, bidder_id: i64, bid_amount: i64) -> PlaceBidCommand {
    PlaceBidCommand {
        auction_id,
        bidder_id,
        bid_amount,
    }
}

async fn highest(harness: &Harness, auction_id: i64) -> i64 {
    harness
        .auctions
        .get(auction_id)
        .await
        .unwrap()
        .unwrap()
        .auction
        .highest_bid
}

fn count_kind(notifications: &[Notification], kind: NotificationType) -> usize {
    notifications.iter().filter(|n| n.kind == kind).count()
}

/// 속성 1: 수락된 입찰마다 최고가는 지금까지 본 최대 금액이며 감소하지 않는다
#[tokio::test]
async fn test_highest_bid_is_monotonic() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 500, now + Duration::hours(1), false).await;

    let mut max_seen = 1000;
    for (bidder, amount) in [(1, 1000), (2, 1500), (1, 2000), (3, 4000)] {
        harness
            .engine
            .place_bid(bid(auction_id, bidder, amount), now)
            .await
            .expect("유효한 입찰이 거절됨");
        max_seen = max_seen.max(amount);
        assert_eq!(highest(&harness, auction_id).await, max_seen);
    }

    // 낮은 입찰은 거절되고 최고가는 그대로
    let rejected = harness
        .engine
        .place_bid(bid(auction_id, 2, 4100), now)
        .await;
    assert!(matches!(
        rejected,
        Err(EngineError::Rejected(BidRejection::BidTooLow { min_amount: 4500 }))
    ));
    assert_eq!(highest(&harness, auction_id).await, 4000);
}

/// 속성 2: 동시 입찰은 정확히 하나만 수락되고, 나머지는 갱신된 상태로 재검증된다
#[tokio::test]
async fn test_concurrent_bids_exactly_one_accepted() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    // 경합 전 상태 기준으로는 둘 다 유효한 같은 금액의 입찰
    let engine_a = Arc::clone(&harness.engine);
    let engine_b = Arc::clone(&harness.engine);
    let task_a =
        tokio::spawn(async move { engine_a.place_bid(bid(auction_id, 1, 2000), now).await });
    let task_b =
        tokio::spawn(async move { engine_b.place_bid(bid(auction_id, 2, 2000), now).await });

    let result_a = task_a.await.unwrap();
    let result_b = task_b.await.unwrap();

    let accepted = [&result_a, &result_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    let rejected = if result_a.is_ok() { result_b } else { result_a };
    assert!(matches!(
        rejected,
        Err(EngineError::Rejected(BidRejection::BidTooLow { .. }))
    ));
    assert_eq!(highest(&harness, auction_id).await, 2000);

    let bids = harness.ledger.list_by_auction(auction_id).await.unwrap();
    assert_eq!(bids.len(), 1);
}

/// 속성 3: 대리 입찰 결투 — 승자는 차순위 상한 + 단위만 지불한다
#[tokio::test]
async fn test_proxy_duel_pays_runner_up_plus_unit() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 10,
                max_amount: 5000,
            },
            now,
        )
        .await
        .unwrap();
    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 20,
                max_amount: 8000,
            },
            now + Duration::seconds(1),
        )
        .await
        .unwrap();

    // 사람 입찰 1000원 → 상한 8000의 사용자 20이 6000원으로 반격
    harness
        .engine
        .place_bid(bid(auction_id, 30, 1000), now)
        .await
        .unwrap();

    assert_eq!(highest(&harness, auction_id).await, 6000);
    let bids = harness.ledger.list_by_auction(auction_id).await.unwrap();
    assert_eq!(bids.len(), 2);
    let counter = &bids[1];
    assert_eq!(counter.bidder_id, 20);
    assert_eq!(counter.amount, 6000);
    assert!(counter.synthetic);
}

/// 입찰자 본인이 상한을 가진 경우: 자기 입찰에는 반격하지 않는다
#[tokio::test]
async fn test_auto_bid_never_counters_own_bid() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 10,
                max_amount: 9000,
            },
            now,
        )
        .await
        .unwrap();

    harness
        .engine
        .place_bid(bid(auction_id, 10, 2000), now)
        .await
        .unwrap();

    // 본인 상한만 있으므로 반격 없음
    assert_eq!(highest(&harness, auction_id).await, 2000);
    assert_eq!(
        harness
            .ledger
            .list_by_auction(auction_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

/// 상한 재등록은 기존 상한을 교체한다
#[tokio::test]
async fn test_auto_bid_reregistration_replaces_ceiling() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 10,
                max_amount: 5000,
            },
            now,
        )
        .await
        .unwrap();
    // 더 낮은 상한으로 교체
    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 10,
                max_amount: 2500,
            },
            now + Duration::seconds(1),
        )
        .await
        .unwrap();

    // 2000원 입찰에 반격하려면 3000원이 필요하지만 교체된 상한은 2500원
    harness
        .engine
        .place_bid(bid(auction_id, 30, 2000), now)
        .await
        .unwrap();
    assert_eq!(highest(&harness, auction_id).await, 2000);
}

/// 상한 해제 후에는 반격하지 않는다
#[tokio::test]
async fn test_delete_auto_bid() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 10,
                max_amount: 9000,
            },
            now,
        )
        .await
        .unwrap();
    assert!(harness
        .engine
        .delete_auto_bid(DeleteAutoBidCommand {
            auction_id,
            user_id: 10,
        })
        .await
        .unwrap());
    // 두 번째 해제는 지울 것이 없다
    assert!(!harness
        .engine
        .delete_auto_bid(DeleteAutoBidCommand {
            auction_id,
            user_id: 10,
        })
        .await
        .unwrap());

    harness
        .engine
        .place_bid(bid(auction_id, 30, 2000), now)
        .await
        .unwrap();
    assert_eq!(highest(&harness, auction_id).await, 2000);
}

/// 속성 4: 자동 연장 — 마감 직전 입찰은 종료 시간을 미루고,
/// 마감 후 입찰은 EXPIRED로 거절된다
#[tokio::test]
async fn test_auto_extend_and_expiry() {
    let harness = setup();
    let now = Utc::now();
    let end_time = now + Duration::seconds(1);
    let auction_id = create_auction(&harness, 99, 1000, None, 1000, end_time, true).await;

    // T - 1초의 입찰은 수락되고 종료 시간이 뒤로 밀린다
    let outcome = harness
        .engine
        .place_bid(bid(auction_id, 1, 1000), now)
        .await
        .unwrap();
    match outcome {
        PlaceBidOutcome::Accepted(accepted) => {
            assert!(accepted.extended);
            assert!(accepted.end_time > end_time);
        }
        other => panic!("예상 밖의 결과: {:?}", other),
    }

    // 연장된 종료 시간 이후의 입찰은 만료 거절
    let after_close = end_time + Duration::seconds(300) + Duration::seconds(1);
    let rejected = harness
        .engine
        .place_bid(bid(auction_id, 2, 5000), after_close)
        .await;
    assert!(matches!(
        rejected,
        Err(EngineError::Rejected(BidRejection::AuctionExpired))
    ));
}

/// 속성 5: 즉시 구매 — 종결 상태 설정, 이후 요청은 모두 거절
#[tokio::test]
async fn test_buy_now_terminal_state() {
    let harness = setup();
    let now = Utc::now();
    let auction_id = create_auction(
        &harness,
        99,
        1000,
        Some(500_000),
        1000,
        now + Duration::hours(1),
        false,
    )
    .await;

    let outcome = harness
        .engine
        .buy_now(
            BuyNowCommand {
                auction_id,
                buyer_id: 7,
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(outcome.price, 500_000);
    assert_eq!(outcome.winner_id, 7);

    let auction = harness
        .auctions
        .get(auction_id)
        .await
        .unwrap()
        .unwrap()
        .auction;
    assert!(auction.is_closed);
    assert_eq!(auction.highest_bid, 500_000);
    assert_eq!(auction.winner_id, Some(7));

    // 구매자와 판매자에게 각각 한 건씩
    let buyer = harness.notifications.list_by_recipient(7).await.unwrap();
    let seller = harness.notifications.list_by_recipient(99).await.unwrap();
    assert_eq!(count_kind(&buyer, NotificationType::BuyNowSuccess), 1);
    assert_eq!(count_kind(&seller, NotificationType::Sold), 1);

    // 종료된 경매에 대한 재시도는 모두 거절
    let second_buy = harness
        .engine
        .buy_now(
            BuyNowCommand {
                auction_id,
                buyer_id: 8,
            },
            now,
        )
        .await;
    assert!(matches!(
        second_buy,
        Err(EngineError::Rejected(BidRejection::AuctionClosed))
    ));
    let late_bid = harness
        .engine
        .place_bid(bid(auction_id, 8, 600_000), now)
        .await;
    assert!(matches!(
        late_bid,
        Err(EngineError::Rejected(BidRejection::AuctionClosed))
    ));
}

/// 즉시 구매 가격 이상의 입찰은 즉시 구매 가격으로 낙찰 처리된다
#[tokio::test]
async fn test_bid_at_buy_now_price_converts() {
    let harness = setup();
    let now = Utc::now();
    let auction_id = create_auction(
        &harness,
        99,
        1000,
        Some(10_000),
        1000,
        now + Duration::hours(1),
        false,
    )
    .await;

    let outcome = harness
        .engine
        .place_bid(bid(auction_id, 7, 12_000), now)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PlaceBidOutcome::BuyNowExecuted { price: 10_000 }
    ));

    let auction = harness
        .auctions
        .get(auction_id)
        .await
        .unwrap()
        .unwrap()
        .auction;
    assert!(auction.is_closed);
    // 입찰가가 아니라 즉시 구매 가격으로 낙찰
    assert_eq!(auction.highest_bid, 10_000);
    assert_eq!(auction.winner_id, Some(7));
}

/// 판매자 본인 입찰/구매 차단
#[tokio::test]
async fn test_self_bid_rejection() {
    let harness = setup();
    let now = Utc::now();
    let auction_id = create_auction(
        &harness,
        99,
        1000,
        Some(10_000),
        1000,
        now + Duration::hours(1),
        false,
    )
    .await;

    let self_bid = harness
        .engine
        .place_bid(bid(auction_id, 99, 2000), now)
        .await;
    assert!(matches!(
        self_bid,
        Err(EngineError::Rejected(BidRejection::SelfBid))
    ));
    let self_buy = harness
        .engine
        .buy_now(
            BuyNowCommand {
                auction_id,
                buyer_id: 99,
            },
            now,
        )
        .await;
    assert!(matches!(
        self_buy,
        Err(EngineError::Rejected(BidRejection::SelfBid))
    ));
}

/// 판매자 입찰 차단을 끄면 일반 입찰은 허용, 즉시 구매는 여전히 차단
#[tokio::test]
async fn test_self_bid_policy_is_configurable() {
    let config = EngineConfig {
        reject_self_bids: false,
        ..EngineConfig::default()
    };
    let harness = setup_with_config(config);
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    harness
        .engine
        .place_bid(bid(auction_id, 99, 2000), now)
        .await
        .expect("정책 해제 시 판매자 입찰 허용");
    let self_buy = harness
        .engine
        .buy_now(
            BuyNowCommand {
                auction_id,
                buyer_id: 99,
            },
            now,
        )
        .await;
    assert!(matches!(
        self_buy,
        Err(EngineError::Rejected(BidRejection::SelfBid))
    ));
}

/// 속성 6: 자연 종료 팬아웃은 정확히 한 번, 재종료는 멱등
#[tokio::test]
async fn test_natural_close_fanout_exactly_once() {
    let harness = setup();
    let now = Utc::now();
    let end_time = now + Duration::seconds(10);
    let auction_id = create_auction(&harness, 99, 1000, None, 1000, end_time, false).await;

    harness
        .engine
        .place_bid(bid(auction_id, 2, 1000), now)
        .await
        .unwrap();
    harness
        .engine
        .place_bid(bid(auction_id, 1, 2000), now)
        .await
        .unwrap();

    let after_end = end_time + Duration::seconds(1);
    let closed = harness
        .engine
        .close_expired_auctions(after_end)
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].winner_id, Some(1));
    assert_eq!(closed[0].final_price, 2000);

    let u1 = harness.notifications.list_by_recipient(1).await.unwrap();
    let u2 = harness.notifications.list_by_recipient(2).await.unwrap();
    let seller = harness.notifications.list_by_recipient(99).await.unwrap();
    assert_eq!(count_kind(&u1, NotificationType::Win), 1);
    assert_eq!(count_kind(&u1, NotificationType::Lose), 0);
    assert_eq!(count_kind(&u2, NotificationType::Lose), 1);
    assert_eq!(count_kind(&u2, NotificationType::Win), 0);
    assert_eq!(count_kind(&seller, NotificationType::Sold), 1);

    // 재종료는 추가 알림 없이 기존 확정 상태를 보고한다
    let reclosed = harness
        .engine
        .close_expired_auctions(after_end)
        .await
        .unwrap();
    assert!(reclosed.is_empty());
    let reclose = harness
        .engine
        .close_auction(auction_id, after_end)
        .await
        .unwrap();
    assert!(reclose.already_closed);
    assert_eq!(reclose.winner_id, Some(1));

    let u1_after = harness.notifications.list_by_recipient(1).await.unwrap();
    let seller_after = harness.notifications.list_by_recipient(99).await.unwrap();
    assert_eq!(count_kind(&u1_after, NotificationType::Win), 1);
    assert_eq!(count_kind(&seller_after, NotificationType::Sold), 1);
}

/// 입찰 없는 자연 종료: 낙찰자 없음, 알림 없음
#[tokio::test]
async fn test_natural_close_without_bids() {
    let harness = setup();
    let now = Utc::now();
    let end_time = now + Duration::seconds(10);
    let auction_id = create_auction(&harness, 99, 1000, None, 1000, end_time, false).await;

    let closed = harness
        .engine
        .close_expired_auctions(end_time + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].winner_id, None);

    let seller = harness.notifications.list_by_recipient(99).await.unwrap();
    assert!(seller.is_empty());
}

/// 속성 7: 미확인 개수는 언제나 읽지 않은 레코드 집합과 일치
#[tokio::test]
async fn test_unread_count_matches_record_set() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    // 입찰 세 번 → 입찰자 확인 3건
    for amount in [1000, 2000, 3000] {
        harness
            .engine
            .place_bid(bid(auction_id, 1, amount), now)
            .await
            .unwrap();
    }

    async fn check(harness: &Harness) -> (Vec<Notification>, i64) {
        let listed = harness.notifications.list_by_recipient(1).await.unwrap();
        let expected = listed.iter().filter(|n| !n.read).count() as i64;
        let counted = harness.notifications.count_unread(1).await.unwrap();
        assert_eq!(counted, expected);
        (listed, counted)
    }

    let (listed, counted) = check(&harness).await;
    assert_eq!(counted, 3);

    // 한 건 읽음 처리 (멱등)
    let first_id = listed[0].id;
    assert!(harness.notifications.mark_read(first_id).await.unwrap());
    assert!(harness.notifications.mark_read(first_id).await.unwrap());
    let (_, counted) = check(&harness).await;
    assert_eq!(counted, 2);

    // 전체 읽음 처리 후 재호출은 0건
    assert_eq!(harness.notifications.mark_all_read(1).await.unwrap(), 2);
    assert_eq!(harness.notifications.mark_all_read(1).await.unwrap(), 0);
    let (_, counted) = check(&harness).await;
    assert_eq!(counted, 0);
}

/// 입찰 이벤트가 관전자 토픽과 수신자 알림 토픽으로 푸시된다
#[tokio::test]
async fn test_push_topics_receive_events() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    let mut spectator = harness.push.subscribe(&PushHub::auction_topic(auction_id));
    let mut seller_inbox = harness.push.subscribe(&PushHub::notification_topic(99));

    harness
        .engine
        .place_bid(bid(auction_id, 1, 2000), now)
        .await
        .unwrap();

    let event = spectator.recv().await.expect("관전자 이벤트 수신 실패");
    assert!(event.contains("BidPlaced"));
    let notice = seller_inbox.recv().await.expect("판매자 알림 수신 실패");
    assert!(notice.contains("NEW_BID"));
}

/// 존재하지 않는 경매와 시작 전 경매에 대한 거절
#[tokio::test]
async fn test_not_found_and_not_started() {
    let harness = setup();
    let now = Utc::now();

    let missing = harness.engine.place_bid(bid(12345, 1, 1000), now).await;
    assert!(matches!(
        missing,
        Err(EngineError::Rejected(BidRejection::AuctionNotFound))
    ));

    let auction_id = harness
        .auctions
        .insert(Auction {
            id: 0,
            seller_id: 99,
            title: "시작 전 상품".to_string(),
            start_price: 1000,
            buy_now_price: None,
            bid_unit: 1000,
            start_time: now + Duration::hours(1),
            end_time: now + Duration::hours(2),
            auto_extend: false,
            highest_bid: 1000,
            bid_count: 0,
            is_closed: false,
            winner_id: None,
            created_at: now,
        })
        .await
        .unwrap();

    let early = harness.engine.place_bid(bid(auction_id, 1, 1000), now).await;
    assert!(matches!(
        early,
        Err(EngineError::Rejected(BidRejection::AuctionNotStarted))
    ));
}

/// 대리 입찰 연쇄가 즉시 구매 가격에 도달하면 상한 소유자의 즉시 구매로 전환되고,
/// 최고가는 즉시 구매 가격을 넘어서지 않는다
#[tokio::test]
async fn test_auto_bid_reaching_buy_now_price_converts() {
    let harness = setup();
    let now = Utc::now();
    let auction_id = create_auction(
        &harness,
        99,
        1000,
        Some(10_000),
        1000,
        now + Duration::hours(1),
        false,
    )
    .await;

    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 20,
                max_amount: 11_000,
            },
            now,
        )
        .await
        .unwrap();
    harness
        .engine
        .register_auto_bid(
            RegisterAutoBidCommand {
                auction_id,
                user_id: 21,
                max_amount: 15_000,
            },
            now + Duration::seconds(1),
        )
        .await
        .unwrap();

    // 상한 결투가 12,000원은 즉시 구매 가격을 넘으므로
    // 상한 15,000원의 사용자 21이 10,000원에 즉시 구매로 낙찰
    let outcome = harness
        .engine
        .place_bid(bid(auction_id, 10, 1000), now)
        .await
        .unwrap();
    match outcome {
        PlaceBidOutcome::Accepted(accepted) => assert_eq!(accepted.new_highest, 10_000),
        other => panic!("예상 밖의 결과: {:?}", other),
    }

    let auction = harness
        .auctions
        .get(auction_id)
        .await
        .unwrap()
        .unwrap()
        .auction;
    assert!(auction.is_closed);
    assert_eq!(auction.highest_bid, 10_000);
    assert_eq!(auction.winner_id, Some(21));

    let bids = harness.ledger.list_by_auction(auction_id).await.unwrap();
    assert!(bids.iter().all(|b| b.amount <= 10_000));
    let last = bids.last().unwrap();
    assert_eq!(last.bidder_id, 21);
    assert_eq!(last.amount, 10_000);
    assert!(last.synthetic);

    // 제3자가 낙찰자보다 싸게 가져갈 수 없다
    let steal = harness
        .engine
        .buy_now(
            BuyNowCommand {
                auction_id,
                buyer_id: 40,
            },
            now,
        )
        .await;
    assert!(matches!(
        steal,
        Err(EngineError::Rejected(BidRejection::AuctionClosed))
    ));

    let buyer = harness.notifications.list_by_recipient(21).await.unwrap();
    let seller = harness.notifications.list_by_recipient(99).await.unwrap();
    assert_eq!(count_kind(&buyer, NotificationType::BuyNowSuccess), 1);
    assert_eq!(count_kind(&seller, NotificationType::Sold), 1);
}

/// 즉시 구매 가격 이상의 입찰이 서 있으면 즉시 구매로 더 싸게 가져갈 수 없다
#[tokio::test]
async fn test_buy_now_refused_when_standing_bid_reaches_price() {
    let harness = setup();
    let now = Utc::now();
    let auction_id = harness
        .auctions
        .insert(Auction {
            id: 0,
            seller_id: 99,
            title: "외부 기록 상품".to_string(),
            start_price: 1000,
            buy_now_price: Some(10_000),
            bid_unit: 1000,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            auto_extend: false,
            highest_bid: 12_000,
            bid_count: 1,
            is_closed: false,
            winner_id: None,
            created_at: now,
        })
        .await
        .unwrap();

    let under_bid_buy = harness
        .engine
        .buy_now(
            BuyNowCommand {
                auction_id,
                buyer_id: 40,
            },
            now,
        )
        .await;
    assert!(matches!(
        under_bid_buy,
        Err(EngineError::Rejected(BidRejection::BuyNowUnavailable))
    ));
    assert_eq!(highest(&harness, auction_id).await, 12_000);
}

/// 판매자 입찰도 증분 규칙 검사가 본인 여부 검사보다 먼저다
#[tokio::test]
async fn test_low_bid_check_precedes_self_bid() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    let low_self = harness.engine.place_bid(bid(auction_id, 99, 500), now).await;
    assert!(matches!(
        low_self,
        Err(EngineError::Rejected(BidRejection::BidTooLow {
            min_amount: 1000
        }))
    ));

    let valid_self = harness
        .engine
        .place_bid(bid(auction_id, 99, 1000), now)
        .await;
    assert!(matches!(
        valid_self,
        Err(EngineError::Rejected(BidRejection::SelfBid))
    ));
}

/// 마감 전 경매의 종료 시도는 거절되고 경매는 열린 채 남는다
#[tokio::test]
async fn test_close_before_end_time_is_rejected() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    let early_close = harness.engine.close_auction(auction_id, now).await;
    assert!(matches!(
        early_close,
        Err(EngineError::Rejected(BidRejection::AuctionNotExpired))
    ));

    let auction = harness
        .auctions
        .get(auction_id)
        .await
        .unwrap()
        .unwrap()
        .auction;
    assert!(!auction.is_closed);
}

/// 종료된 경매의 관전 토픽은 남은 이벤트 전달 후 닫힌다
#[tokio::test]
async fn test_closed_auction_topic_is_released() {
    let harness = setup();
    let now = Utc::now();
    let end_time = now + Duration::seconds(10);
    let auction_id = create_auction(&harness, 99, 1000, None, 1000, end_time, false).await;

    let mut spectator = harness.push.subscribe(&PushHub::auction_topic(auction_id));

    harness
        .engine
        .place_bid(bid(auction_id, 1, 1000), now)
        .await
        .unwrap();
    harness
        .engine
        .close_expired_auctions(end_time + Duration::seconds(1))
        .await
        .unwrap();

    let first = spectator.recv().await.unwrap();
    assert!(first.contains("BidPlaced"));
    let second = spectator.recv().await.unwrap();
    assert!(second.contains("AuctionClosed"));
    assert!(matches!(spectator.recv().await, Err(RecvError::Closed)));
}

/// 속성 2의 수락 분기: 선행 입찰 이후에도 증분 규칙을 만족하는 입찰은 수락된다
#[tokio::test]
async fn test_qualifying_follow_up_bid_is_accepted() {
    let harness = setup();
    let now = Utc::now();
    let auction_id =
        create_auction(&harness, 99, 1000, None, 1000, now + Duration::hours(1), false).await;

    harness
        .engine
        .place_bid(bid(auction_id, 1, 2000), now)
        .await
        .expect("선행 입찰이 거절됨");

    let engine = Arc::clone(&harness.engine);
    let follow_up = tokio::spawn(async move { engine.place_bid(bid(auction_id, 2, 5000), now).await })
        .await
        .unwrap();
    assert!(follow_up.is_ok());

    assert_eq!(highest(&harness, auction_id).await, 5000);
    let bids = harness.ledger.list_by_auction(auction_id).await.unwrap();
    assert_eq!(bids.len(), 2);
    assert_eq!(bids[0].amount, 2000);
    assert_eq!(bids[1].amount, 5000);
}

/// 연장 윈도우가 설정되면 마감 임박 입찰만 종료 시간을 미룬다
#[tokio::test]
async fn test_extension_window_limits_extension() {
    let config = EngineConfig {
        extension_window_secs: 600,
        ..EngineConfig::default()
    };
    let harness = setup_with_config(config);
    let now = Utc::now();
    let end_time = now + Duration::hours(2);
    let auction_id = create_auction(&harness, 99, 1000, None, 1000, end_time, true).await;

    // 마감까지 2시간 남은 입찰은 연장 대상이 아니다
    let outcome = harness
        .engine
        .place_bid(bid(auction_id, 1, 1000), now)
        .await
        .unwrap();
    match outcome {
        PlaceBidOutcome::Accepted(accepted) => {
            assert!(!accepted.extended);
            assert_eq!(accepted.end_time, end_time);
        }
        other => panic!("예상 밖의 결과: {:?}", other),
    }

    // 마감 5분 전 입찰은 연장된다
    let late = end_time - Duration::seconds(300);
    let outcome = harness
        .engine
        .place_bid(bid(auction_id, 2, 2000), late)
        .await
        .unwrap();
    match outcome {
        PlaceBidOutcome::Accepted(accepted) => {
            assert!(accepted.extended);
            assert_eq!(accepted.end_time, end_time + Duration::seconds(300));
        }
        other => panic!("예상 밖의 결과: {:?}", other),
    }
}
