/// 인메모리 저장소 구현
/// 테스트 및 단일 프로세스 운용용 기준 구현
// region:    --- Imports
use crate::auction::model::Auction;
use crate::bidding::model::{AutoBid, Bid};
use crate::notification::Notification;
use crate::store::{
    AuctionStore, AutoBidStore, BidLedger, CommitOutcome, NewNotification, NotificationStore,
    StoreError, VersionedAuction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

// endregion: --- Imports

// region:    --- Auction Store
#[derive(Default)]
pub struct InMemoryAuctionStore {
    records: RwLock<HashMap<i64, VersionedAuction>>,
    next_id: AtomicI64,
}

impl InMemoryAuctionStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl AuctionStore for InMemoryAuctionStore {
    async fn insert(&self, mut auction: Auction) -> Result<i64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        auction.id = id;
        self.records
            .write()
            .await
            .insert(id, VersionedAuction { auction, version: 0 });
        Ok(id)
    }

    async fn get(&self, auction_id: i64) -> Result<Option<VersionedAuction>, StoreError> {
        Ok(self.records.read().await.get(&auction_id).cloned())
    }

    async fn compare_and_update(
        &self,
        auction_id: i64,
        expected_version: i64,
        updated: Auction,
    ) -> Result<CommitOutcome, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&auction_id) {
            Some(record) if record.version == expected_version => {
                record.auction = updated;
                record.version += 1;
                Ok(CommitOutcome::Committed)
            }
            Some(_) => Ok(CommitOutcome::Conflict),
            None => Ok(CommitOutcome::Conflict),
        }
    }

    async fn list_open_expired(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let records = self.records.read().await;
        let mut expired: Vec<i64> = records
            .values()
            .filter(|r| !r.auction.is_closed && r.auction.end_time <= now)
            .map(|r| r.auction.id)
            .collect();
        expired.sort_unstable();
        Ok(expired)
    }
}
// endregion: --- Auction Store

// region:    --- Bid Ledger
#[derive(Default)]
pub struct InMemoryBidLedger {
    bids: RwLock<HashMap<i64, Vec<Bid>>>,
}

impl InMemoryBidLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BidLedger for InMemoryBidLedger {
    async fn append(&self, mut bid: Bid) -> Result<i64, StoreError> {
        let mut bids = self.bids.write().await;
        let entries = bids.entry(bid.auction_id).or_default();
        let sequence = entries.len() as i64 + 1;
        bid.id = sequence;
        entries.push(bid);
        Ok(sequence)
    }

    async fn list_by_auction(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        Ok(self
            .bids
            .read()
            .await
            .get(&auction_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn highest_bid(&self, auction_id: i64) -> Result<Option<i64>, StoreError> {
        Ok(self
            .bids
            .read()
            .await
            .get(&auction_id)
            .and_then(|bids| bids.iter().map(|b| b.amount).max()))
    }
}
// endregion: --- Bid Ledger

// region:    --- AutoBid Store
#[derive(Default)]
pub struct InMemoryAutoBidStore {
    ceilings: RwLock<HashMap<i64, Vec<AutoBid>>>,
}

impl InMemoryAutoBidStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AutoBidStore for InMemoryAutoBidStore {
    async fn upsert(
        &self,
        auction_id: i64,
        user_id: i64,
        max_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut ceilings = self.ceilings.write().await;
        let entries = ceilings.entry(auction_id).or_default();
        // 재등록은 기존 상한을 대체한다
        entries.retain(|c| c.user_id != user_id);
        entries.push(AutoBid {
            auction_id,
            user_id,
            max_amount,
            created_at: now,
        });
        Ok(())
    }

    async fn delete(&self, auction_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let mut ceilings = self.ceilings.write().await;
        match ceilings.get_mut(&auction_id) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|c| c.user_id != user_id);
                Ok(entries.len() < before)
            }
            None => Ok(false),
        }
    }

    async fn list_active(&self, auction_id: i64) -> Result<Vec<AutoBid>, StoreError> {
        Ok(self
            .ceilings
            .read()
            .await
            .get(&auction_id)
            .cloned()
            .unwrap_or_default())
    }
}
// endregion: --- AutoBid Store

// region:    --- Notification Store
#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
    next_id: AtomicI64,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            notifications: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn append(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let record = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            recipient_id: notification.recipient_id,
            auction_id: notification.auction_id,
            kind: notification.kind,
            message: notification.message,
            created_at: notification.created_at,
            read: false,
        };
        self.notifications.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_by_recipient(&self, user_id: i64) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_unread(&self, user_id: i64) -> Result<i64, StoreError> {
        // 별도 카운터 없이 항상 레코드에서 계산
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.read)
            .count() as i64)
    }

    async fn mark_read(&self, notification_id: i64) -> Result<bool, StoreError> {
        let mut notifications = self.notifications.write().await;
        match notifications.iter_mut().find(|n| n.id == notification_id) {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut notifications = self.notifications.write().await;
        let mut updated = 0;
        for notification in notifications
            .iter_mut()
            .filter(|n| n.recipient_id == user_id && !n.read)
        {
            notification.read = true;
            updated += 1;
        }
        Ok(updated)
    }
}
// endregion: --- Notification Store
