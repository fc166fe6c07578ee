/// 실시간 푸시 허브
/// 수신자별(`notifications.<userId>`), 경매별(`auction.<id>.updates`) 토픽으로
/// 인프로세스 브로드캐스트. 전달은 최선 노력이며 내구 기록이 항상 기준이다.
// region:    --- Imports
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

// endregion: --- Imports

// region:    --- Push Hub
const CHANNEL_CAPACITY: usize = 256;

pub struct PushHub {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PushHub {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// 수신자별 알림 토픽
    pub fn notification_topic(user_id: i64) -> String {
        format!("notifications.{}", user_id)
    }

    /// 경매 관전자 토픽
    pub fn auction_topic(auction_id: i64) -> String {
        format!("auction.{}.updates", auction_id)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut topics = self.topics.lock().expect("push hub lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// 토픽으로 페이로드 발행, 전달된 구독자 수 반환
    /// 구독자가 없으면 그대로 버려진다
    pub fn publish(&self, topic: &str, payload: String) -> usize {
        match self.sender(topic).send(payload) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("{:<12} --> 구독자 없음: topic={}", "Push", topic);
                0
            }
        }
    }

    /// 토픽 구독
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        self.sender(topic).subscribe()
    }

    /// 더 쓰지 않는 토픽 제거
    /// 남은 구독자는 버퍼를 비운 뒤 채널 종료를 본다
    pub fn remove(&self, topic: &str) {
        let mut topics = self.topics.lock().expect("push hub lock poisoned");
        topics.remove(topic);
    }
}
// endregion: --- Push Hub
