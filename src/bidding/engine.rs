/// 입찰 엔진
/// 입찰 검증과 직렬화, 대리 입찰 연쇄, 즉시 구매, 경매 종료를 담당한다.
/// 경매별 락이 직렬화 지점이고, 버전 기반 낙관적 업데이트가 외부 기록자를
/// 막는 이중 안전장치다. 락을 쥔 동안에는 알림을 보내지 않는다.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::Auction;
use crate::bidding::autobid;
use crate::bidding::commands::{
    BidAccepted, BidRejection, BuyNowCommand, BuyNowOutcome, CloseOutcome, DeleteAutoBidCommand,
    EngineError, PlaceBidCommand, PlaceBidOutcome, RegisterAutoBidCommand,
};
use crate::bidding::model::Bid;
use crate::config::EngineConfig;
use crate::lifecycle::{self, PlannedNotice};
use crate::notification::{NotificationFanout, NotificationType};
use crate::push::PushHub;
use crate::store::{AuctionStore, AutoBidStore, BidLedger, CommitOutcome, VersionedAuction};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as TokioMutex;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Engine
/// 대리 입찰 연쇄 안전 상한
/// 매 라운드 최고가가 최소 1원은 오르므로 수학적으로는 항상 끝나지만,
/// 상한 저장소 구현 오류에 대비해 라운드 수를 제한한다.
const MAX_AUTO_BID_ROUNDS: usize = 10_000;

/// 수락된 입찰 한 건의 결과 (락 해제 후 알림 발송에 쓰인다)
struct Admission {
    auction: Auction,
    bids: Vec<Bid>,
    extended: bool,
}

/// 즉시 구매 결과
/// 대리 입찰 연쇄가 즉시 구매 가격에 도달해 전환된 경우에는
/// 전환 전에 수락된 입찰들이 `admitted`에 담긴다.
struct Purchase {
    auction: Auction,
    buyer_id: i64,
    price: i64,
    admitted: Vec<Bid>,
}

/// 종료 결과와 팬아웃 계획
struct Closure {
    auction: Auction,
    plan: Vec<PlannedNotice>,
}

enum PlacedInner {
    Admitted(Admission),
    BuyNow(Purchase),
}

pub struct BidEngine {
    auctions: Arc<dyn AuctionStore>,
    ledger: Arc<dyn BidLedger>,
    auto_bids: Arc<dyn AutoBidStore>,
    fanout: NotificationFanout,
    push: Arc<PushHub>,
    config: EngineConfig,
    /// 경매별 배타 구간
    locks: StdMutex<HashMap<i64, Arc<TokioMutex<()>>>>,
}

impl BidEngine {
    pub fn new(
        auctions: Arc<dyn AuctionStore>,
        ledger: Arc<dyn BidLedger>,
        auto_bids: Arc<dyn AutoBidStore>,
        fanout: NotificationFanout,
        push: Arc<PushHub>,
        config: EngineConfig,
    ) -> Self {
        Self {
            auctions,
            ledger,
            auto_bids,
            fanout,
            push,
            config,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn auction_lock(&self, auction_id: i64) -> Arc<TokioMutex<()>> {
        let mut locks = self.locks.lock().expect("auction lock registry poisoned");
        Arc::clone(locks.entry(auction_id).or_default())
    }

    /// 종료 확정된 경매의 락 엔트리와 관전 토픽 정리
    /// 이후 늦게 도착한 접근은 종료 플래그와 버전 검사가 거른다
    fn release_closed(&self, auction_id: i64) {
        self.locks
            .lock()
            .expect("auction lock registry poisoned")
            .remove(&auction_id);
        self.push.remove(&PushHub::auction_topic(auction_id));
    }

    /// 1. 입찰
    pub async fn place_bid(
        &self,
        cmd: PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<PlaceBidOutcome, EngineError> {
        info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Bidding", cmd);

        let lock = self.auction_lock(cmd.auction_id);
        let inner = {
            let _guard = lock.lock().await;
            self.place_bid_locked(&cmd, now).await?
        };

        match inner {
            PlacedInner::Admitted(admission) => {
                let accepted = BidAccepted {
                    new_highest: admission.auction.highest_bid,
                    bid_count: admission.auction.bid_count,
                    extended: admission.extended,
                    end_time: admission.auction.end_time,
                };
                self.dispatch_bid_effects(&admission.auction, &admission.bids, now)
                    .await;
                Ok(PlaceBidOutcome::Accepted(accepted))
            }
            PlacedInner::BuyNow(purchase) => {
                // 대리 입찰 연쇄가 전환시킨 경우 낙찰자는 명령의 입찰자가 아니다
                let outcome = if purchase.buyer_id == cmd.bidder_id {
                    PlaceBidOutcome::BuyNowExecuted {
                        price: purchase.price,
                    }
                } else {
                    PlaceBidOutcome::Accepted(BidAccepted {
                        new_highest: purchase.auction.highest_bid,
                        bid_count: purchase.auction.bid_count,
                        extended: false,
                        end_time: purchase.auction.end_time,
                    })
                };
                self.dispatch_buy_now_effects(&purchase, now).await;
                self.release_closed(cmd.auction_id);
                Ok(outcome)
            }
        }
    }

    /// 경매별 락 아래에서의 입찰 검증과 커밋
    async fn place_bid_locked(
        &self,
        cmd: &PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<PlacedInner, EngineError> {
        let mut retries = 0;
        while retries < self.config.max_retries {
            let Some(VersionedAuction { auction, version }) =
                self.auctions.get(cmd.auction_id).await?
            else {
                return Err(BidRejection::AuctionNotFound.into());
            };

            if auction.is_closed {
                return Err(BidRejection::AuctionClosed.into());
            }
            if now >= auction.end_time {
                return Err(BidRejection::AuctionExpired.into());
            }
            if now < auction.start_time {
                return Err(BidRejection::AuctionNotStarted.into());
            }
            // 즉시 구매 가격 이상의 입찰은 즉시 구매 가격으로 낙찰 처리
            if let Some(buy_now_price) = auction.buy_now_price {
                if cmd.bid_amount >= buy_now_price {
                    if cmd.bidder_id == auction.seller_id {
                        return Err(BidRejection::SelfBid.into());
                    }
                    match self
                        .commit_buy_now(&auction, version, cmd.bidder_id, buy_now_price, now)
                        .await?
                    {
                        Some(purchase) => return Ok(PlacedInner::BuyNow(purchase)),
                        None => {
                            retries += 1;
                            continue;
                        }
                    }
                }
            }

            let min_next_bid = auction.min_next_bid();
            if cmd.bid_amount < min_next_bid {
                return Err(BidRejection::BidTooLow {
                    min_amount: min_next_bid,
                }
                .into());
            }
            // 증분 규칙 통과 후에 판매자 본인 여부 검사
            if self.config.reject_self_bids && cmd.bidder_id == auction.seller_id {
                return Err(BidRejection::SelfBid.into());
            }

            // 수락: 사람 입찰과 그에 따른 대리 입찰 연쇄를 한 번에 계산
            let mut updated = auction.clone();
            let mut planned = vec![Bid {
                id: 0,
                auction_id: cmd.auction_id,
                bidder_id: cmd.bidder_id,
                amount: cmd.bid_amount,
                synthetic: false,
                bid_time: now,
            }];
            updated.highest_bid = cmd.bid_amount;
            updated.bid_count += 1;

            let ceilings = self.auto_bids.list_active(cmd.auction_id).await?;
            let mut last_bidder = cmd.bidder_id;
            let mut rounds = 0;
            let mut converted: Option<i64> = None;
            while let Some(counter) =
                autobid::resolve(&ceilings, last_bidder, updated.highest_bid, updated.bid_unit)
            {
                // 대리 입찰도 즉시 구매 가격에 도달하면 즉시 구매로 전환
                // (최고가가 즉시 구매 가격을 넘은 채 진행 중인 경매는 없다)
                if let Some(price) = updated.buy_now_price {
                    if counter.amount >= price {
                        converted = Some(counter.user_id);
                        break;
                    }
                }
                planned.push(Bid {
                    id: 0,
                    auction_id: cmd.auction_id,
                    bidder_id: counter.user_id,
                    amount: counter.amount,
                    synthetic: true,
                    bid_time: now,
                });
                updated.highest_bid = counter.amount;
                updated.bid_count += 1;
                last_bidder = counter.user_id;
                rounds += 1;
                if rounds >= MAX_AUTO_BID_ROUNDS {
                    warn!(
                        "{:<12} --> 대리 입찰 연쇄가 상한에 도달: auction_id={}",
                        "AutoBid", cmd.auction_id
                    );
                    break;
                }
            }

            if let (Some(winner), Some(price)) = (converted, updated.buy_now_price) {
                updated.highest_bid = price;
                updated.bid_count += 1;
                updated.is_closed = true;
                updated.winner_id = Some(winner);
                match self
                    .auctions
                    .compare_and_update(cmd.auction_id, version, updated.clone())
                    .await?
                {
                    CommitOutcome::Committed => {
                        for bid in &mut planned {
                            bid.id = self.ledger.append(bid.clone()).await?;
                        }
                        self.ledger
                            .append(Bid {
                                id: 0,
                                auction_id: cmd.auction_id,
                                bidder_id: winner,
                                amount: price,
                                synthetic: true,
                                bid_time: now,
                            })
                            .await?;
                        return Ok(PlacedInner::BuyNow(Purchase {
                            auction: updated,
                            buyer_id: winner,
                            price,
                            admitted: planned,
                        }));
                    }
                    CommitOutcome::Conflict => {
                        warn!(
                            "{:<12} --> 낙관적 업데이트로 인한 버전 충돌: 재시도",
                            "Bidding"
                        );
                        retries += 1;
                        continue;
                    }
                }
            }

            let extended = self.maybe_extend(&mut updated, now);

            match self
                .auctions
                .compare_and_update(cmd.auction_id, version, updated.clone())
                .await?
            {
                CommitOutcome::Committed => {
                    // 같은 배타 구간 안에서 원장 순번 부여
                    for bid in &mut planned {
                        bid.id = self.ledger.append(bid.clone()).await?;
                    }
                    return Ok(PlacedInner::Admitted(Admission {
                        auction: updated,
                        bids: planned,
                        extended,
                    }));
                }
                CommitOutcome::Conflict => {
                    warn!(
                        "{:<12} --> 낙관적 업데이트로 인한 버전 충돌: 재시도",
                        "Bidding"
                    );
                    retries += 1;
                    continue;
                }
            }
        }

        Err(EngineError::Conflict)
    }

    /// 자동 연장
    /// 윈도우가 0이면 진행 중 모든 입찰이 연장 대상
    fn maybe_extend(&self, auction: &mut Auction, now: DateTime<Utc>) -> bool {
        if !auction.auto_extend {
            return false;
        }
        let window = self.config.extension_window_secs;
        let in_window = window <= 0 || auction.end_time - now <= Duration::seconds(window);
        if in_window {
            auction.end_time = auction.end_time + Duration::seconds(self.config.extension_secs);
        }
        in_window
    }

    /// 2. 즉시 구매
    pub async fn buy_now(
        &self,
        cmd: BuyNowCommand,
        now: DateTime<Utc>,
    ) -> Result<BuyNowOutcome, EngineError> {
        info!("{:<12} --> 즉시 구매 요청 처리 시작: {:?}", "BuyNow", cmd);

        let lock = self.auction_lock(cmd.auction_id);
        let purchase = {
            let _guard = lock.lock().await;
            self.buy_now_locked(&cmd, now).await?
        };

        let outcome = BuyNowOutcome {
            price: purchase.price,
            winner_id: purchase.buyer_id,
        };
        self.dispatch_buy_now_effects(&purchase, now).await;
        self.release_closed(cmd.auction_id);
        Ok(outcome)
    }

    async fn buy_now_locked(
        &self,
        cmd: &BuyNowCommand,
        now: DateTime<Utc>,
    ) -> Result<Purchase, EngineError> {
        let mut retries = 0;
        while retries < self.config.max_retries {
            let Some(VersionedAuction { auction, version }) =
                self.auctions.get(cmd.auction_id).await?
            else {
                return Err(BidRejection::AuctionNotFound.into());
            };

            if auction.is_closed {
                return Err(BidRejection::AuctionClosed.into());
            }
            if now >= auction.end_time {
                return Err(BidRejection::AuctionExpired.into());
            }
            if now < auction.start_time {
                return Err(BidRejection::AuctionNotStarted.into());
            }
            // 즉시 구매의 판매자 본인 차단은 설정과 무관하게 항상 적용
            if cmd.buyer_id == auction.seller_id {
                return Err(BidRejection::SelfBid.into());
            }
            let Some(price) = auction.buy_now_price else {
                return Err(BidRejection::BuyNowUnavailable.into());
            };
            // 즉시 구매 가격 이상의 입찰이 이미 서 있으면 더 싼 값에 가져갈 수 없다
            if auction.bid_count > 0 && auction.highest_bid >= price {
                return Err(BidRejection::BuyNowUnavailable.into());
            }

            match self
                .commit_buy_now(&auction, version, cmd.buyer_id, price, now)
                .await?
            {
                Some(purchase) => return Ok(purchase),
                None => {
                    warn!(
                        "{:<12} --> 낙관적 업데이트로 인한 버전 충돌: 재시도",
                        "BuyNow"
                    );
                    retries += 1;
                }
            }
        }

        Err(EngineError::Conflict)
    }

    /// 즉시 구매 커밋: 최고가/낙찰자/종료 플래그를 한 번에 갱신하고
    /// 구매 기록을 원장에 남긴다
    async fn commit_buy_now(
        &self,
        auction: &Auction,
        version: i64,
        buyer_id: i64,
        price: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Purchase>, EngineError> {
        let mut updated = auction.clone();
        updated.highest_bid = price;
        updated.bid_count += 1;
        updated.is_closed = true;
        updated.winner_id = Some(buyer_id);

        match self
            .auctions
            .compare_and_update(auction.id, version, updated.clone())
            .await?
        {
            CommitOutcome::Committed => {
                self.ledger
                    .append(Bid {
                        id: 0,
                        auction_id: auction.id,
                        bidder_id: buyer_id,
                        amount: price,
                        synthetic: false,
                        bid_time: now,
                    })
                    .await?;
                Ok(Some(Purchase {
                    auction: updated,
                    buyer_id,
                    price,
                    admitted: Vec::new(),
                }))
            }
            CommitOutcome::Conflict => Ok(None),
        }
    }

    /// 3. 자동 입찰 상한 등록 (기존 상한 교체)
    pub async fn register_auto_bid(
        &self,
        cmd: RegisterAutoBidCommand,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        info!("{:<12} --> 자동 입찰 등록: {:?}", "AutoBid", cmd);

        if cmd.max_amount <= 0 {
            return Err(BidRejection::InvalidMaxAmount.into());
        }
        let Some(VersionedAuction { auction, .. }) = self.auctions.get(cmd.auction_id).await?
        else {
            return Err(BidRejection::AuctionNotFound.into());
        };
        if auction.is_closed {
            return Err(BidRejection::AuctionClosed.into());
        }
        if now >= auction.end_time {
            return Err(BidRejection::AuctionExpired.into());
        }
        if self.config.reject_self_bids && cmd.user_id == auction.seller_id {
            return Err(BidRejection::SelfBid.into());
        }

        self.auto_bids
            .upsert(cmd.auction_id, cmd.user_id, cmd.max_amount, now)
            .await?;
        Ok(())
    }

    /// 4. 자동 입찰 상한 해제, 실제로 지워졌으면 true
    pub async fn delete_auto_bid(&self, cmd: DeleteAutoBidCommand) -> Result<bool, EngineError> {
        info!("{:<12} --> 자동 입찰 해제: {:?}", "AutoBid", cmd);
        Ok(self.auto_bids.delete(cmd.auction_id, cmd.user_id).await?)
    }

    /// 5. 만료 경매 일괄 종료 (스케줄러 진입점)
    /// 새로 종료 처리된 경매들의 결과를 반환한다
    pub async fn close_expired_auctions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CloseOutcome>, EngineError> {
        let expired = self.auctions.list_open_expired(now).await?;
        let mut outcomes = Vec::new();
        for auction_id in expired {
            match self.close_auction(auction_id, now).await {
                Ok(outcome) => {
                    if !outcome.already_closed {
                        outcomes.push(outcome);
                    }
                }
                // 스윕과 즉시 구매가 경합하면 이미 종료된 상태를 보게 된다
                Err(EngineError::Rejected(BidRejection::AuctionNotFound)) => continue,
                // 목록 조회와 락 획득 사이에 자동 연장이 끼어들 수 있다
                Err(EngineError::Rejected(BidRejection::AuctionNotExpired)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    /// 자연 종료 (멱등: 이미 종료된 경매는 기존 확정 상태를 보고)
    pub async fn close_auction(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, EngineError> {
        let lock = self.auction_lock(auction_id);
        let closed = {
            let _guard = lock.lock().await;
            self.close_auction_locked(auction_id, now).await?
        };

        match closed {
            Ok(closure) => {
                let outcome = CloseOutcome {
                    auction_id,
                    winner_id: closure.auction.winner_id,
                    final_price: closure.auction.highest_bid,
                    already_closed: false,
                };
                self.dispatch_close_effects(&closure, now).await;
                self.release_closed(auction_id);
                Ok(outcome)
            }
            Err(terminal) => {
                self.release_closed(auction_id);
                Ok(terminal)
            }
        }
    }

    /// 락 아래 종료 처리. 이미 종료된 경우 Err 쪽으로 확정 상태를 돌려준다.
    async fn close_auction_locked(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Result<Closure, CloseOutcome>, EngineError> {
        let mut retries = 0;
        while retries < self.config.max_retries {
            let Some(VersionedAuction { auction, version }) = self.auctions.get(auction_id).await?
            else {
                return Err(BidRejection::AuctionNotFound.into());
            };

            if auction.is_closed {
                return Ok(Err(CloseOutcome {
                    auction_id,
                    winner_id: auction.winner_id,
                    final_price: auction.highest_bid,
                    already_closed: true,
                }));
            }
            if now < auction.end_time {
                // 마감 전 경매는 종료할 수 없다
                return Err(BidRejection::AuctionNotExpired.into());
            }

            // 종료 시점의 원장 스냅샷으로 낙찰자와 팬아웃 대상 계산
            let bids = self.ledger.list_by_auction(auction_id).await?;
            let winner = if auction.bid_count > 0 {
                lifecycle::determine_winner(&bids)
            } else {
                None
            };

            let mut updated = auction.clone();
            updated.is_closed = true;
            updated.winner_id = winner;

            match self
                .auctions
                .compare_and_update(auction_id, version, updated.clone())
                .await?
            {
                CommitOutcome::Committed => {
                    info!(
                        "{:<12} --> 경매 종료: auction_id={}, winner={:?}",
                        "Lifecycle", auction_id, winner
                    );
                    let plan = lifecycle::close_fanout_plan(&updated, &bids, winner);
                    return Ok(Ok(Closure {
                        auction: updated,
                        plan,
                    }));
                }
                CommitOutcome::Conflict => {
                    warn!(
                        "{:<12} --> 낙관적 업데이트로 인한 버전 충돌: 재시도",
                        "Lifecycle"
                    );
                    retries += 1;
                }
            }
        }

        Err(EngineError::Conflict)
    }

    // region:    --- Effects (락 해제 후)

    /// 수락된 입찰(대리 입찰 포함)마다 입찰자 확인 + 판매자 알림,
    /// 관전자 토픽으로 가격 변동 이벤트
    async fn dispatch_bid_effects(&self, auction: &Auction, bids: &[Bid], now: DateTime<Utc>) {
        for bid in bids {
            let bidder_message = if bid.synthetic {
                format!(
                    "'{}' 경매에 자동 입찰이 {}원으로 대리 입찰했습니다.",
                    auction.title, bid.amount
                )
            } else {
                format!(
                    "'{}' 경매에 입찰이 접수되었습니다. (입찰가 {}원)",
                    auction.title, bid.amount
                )
            };
            self.notify_or_log(bid.bidder_id, NotificationType::BidPlaced, auction.id, bidder_message, now)
                .await;
            self.notify_or_log(
                auction.seller_id,
                NotificationType::NewBid,
                auction.id,
                format!(
                    "'{}' 경매에 새로운 입찰 {}원이 등록되었습니다.",
                    auction.title, bid.amount
                ),
                now,
            )
            .await;

            self.publish_event(AuctionEvent::BidPlaced {
                auction_id: auction.id,
                bidder_id: bid.bidder_id,
                bid_amount: bid.amount,
                synthetic: bid.synthetic,
                end_time: auction.end_time,
                timestamp: now,
            });
        }
    }

    /// 전환 전에 수락된 입찰들의 알림 후 구매자 성공 + 판매자 판매 완료 알림,
    /// 관전자 이벤트
    async fn dispatch_buy_now_effects(&self, purchase: &Purchase, now: DateTime<Utc>) {
        let auction = &purchase.auction;
        self.dispatch_bid_effects(auction, &purchase.admitted, now)
            .await;
        self.notify_or_log(
            purchase.buyer_id,
            NotificationType::BuyNowSuccess,
            auction.id,
            format!(
                "'{}' 상품 즉시 구매가 완료되었습니다. ({}원)",
                auction.title, purchase.price
            ),
            now,
        )
        .await;
        self.notify_or_log(
            auction.seller_id,
            NotificationType::Sold,
            auction.id,
            format!(
                "'{}' 상품이 즉시 구매로 판매되었습니다. ({}원)",
                auction.title, purchase.price
            ),
            now,
        )
        .await;

        self.publish_event(AuctionEvent::BuyNowExecuted {
            auction_id: auction.id,
            buyer_id: purchase.buyer_id,
            price: purchase.price,
            timestamp: now,
        });
    }

    /// 종료 팬아웃: 계획된 수신자 집합에 정확히 한 건씩
    async fn dispatch_close_effects(&self, closure: &Closure, now: DateTime<Utc>) {
        for notice in &closure.plan {
            self.notify_or_log(
                notice.recipient_id,
                notice.kind,
                closure.auction.id,
                notice.message.clone(),
                now,
            )
            .await;
        }

        self.publish_event(AuctionEvent::AuctionClosed {
            auction_id: closure.auction.id,
            winner_id: closure.auction.winner_id,
            final_price: closure.auction.highest_bid,
            timestamp: now,
        });
    }

    /// 알림 실패는 기록만 하고 원인 연산을 되돌리지 않는다
    async fn notify_or_log(
        &self,
        recipient_id: i64,
        kind: NotificationType,
        auction_id: i64,
        message: String,
        now: DateTime<Utc>,
    ) {
        if let Err(e) = self
            .fanout
            .notify(recipient_id, kind, Some(auction_id), message, now)
            .await
        {
            error!(
                "{:<12} --> 알림 기록 실패: recipient={}, {:?}",
                "Fanout", recipient_id, e
            );
        }
    }

    fn publish_event(&self, event: AuctionEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => {
                self.push.publish(&event.topic(), payload);
            }
            Err(e) => error!("{:<12} --> 이벤트 직렬화 실패: {:?}", "Push", e),
        }
    }

    // endregion: --- Effects
}
// endregion: --- Engine

// endregion: --- Tests
