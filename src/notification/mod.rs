/// 알림 모델과 팬아웃
/// 모든 상태 전이는 수신자별로 내구 기록 후 실시간 푸시된다.
// region:    --- Imports
use crate::push::PushHub;
use crate::store::{NewNotification, NotificationStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

// endregion: --- Imports

// region:    --- Notification Model
/// 알림 타입
/// MESSAGE, INQUIRY_ANSWER는 코어 밖 협력 서비스(채팅, 문의)가 같은
/// 저장소를 통해 기록한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    BidPlaced,
    NewBid,
    Win,
    Lose,
    Sold,
    BuyNowSuccess,
    Message,
    InquiryAnswer,
}

/// 알림 레코드
/// read 플래그는 false → true 단방향
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub auction_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}
// endregion: --- Notification Model

// region:    --- Notification Fanout
/// 알림 팬아웃
/// 내구 기록이 먼저, 푸시는 최선 노력 (실패해도 원인 연산을 되돌리지 않는다)
#[derive(Clone)]
pub struct NotificationFanout {
    store: Arc<dyn NotificationStore>,
    push: Arc<PushHub>,
}

impl NotificationFanout {
    pub fn new(store: Arc<dyn NotificationStore>, push: Arc<PushHub>) -> Self {
        Self { store, push }
    }

    /// 알림 한 건 기록 후 수신자 토픽으로 푸시
    pub async fn notify(
        &self,
        recipient_id: i64,
        kind: NotificationType,
        auction_id: Option<i64>,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        let record = self
            .store
            .append(NewNotification {
                recipient_id,
                auction_id,
                kind,
                message,
                created_at: now,
            })
            .await?;

        match serde_json::to_string(&record) {
            Ok(payload) => {
                self.push
                    .publish(&PushHub::notification_topic(recipient_id), payload);
            }
            Err(e) => warn!(
                "{:<12} --> 알림 페이로드 직렬화 실패: {:?}",
                "Fanout", e
            ),
        }
        Ok(record)
    }
}
// endregion: --- Notification Fanout
