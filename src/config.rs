/// 엔진 설정
/// 환경 변수로 조정 가능하며, 미설정 시 기본값 사용
// region:    --- Imports
use std::str::FromStr;
use tracing::warn;

// endregion: --- Imports

// region:    --- Engine Config
/// 입찰 엔진 및 스케줄러 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 판매자 본인 경매 입찰 차단 여부 (즉시 구매는 설정과 무관하게 항상 차단)
    pub reject_self_bids: bool,
    /// 자동 연장 판정 윈도우(초). 0이면 종료 전 모든 입찰이 연장 대상
    pub extension_window_secs: i64,
    /// 자동 연장 시 종료 시간을 미는 길이(초)
    pub extension_secs: i64,
    /// 낙관적 업데이트 충돌 시 최대 재시도 횟수
    pub max_retries: u32,
    /// 만료 경매 정리 주기(초)
    pub sweep_interval_secs: u64,
    /// 웹 서버 바인드 주소
    pub bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reject_self_bids: true,
            extension_window_secs: 0,
            extension_secs: 300,
            max_retries: 100,
            sweep_interval_secs: 1,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl EngineConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reject_self_bids: env_or("AUCTION_REJECT_SELF_BIDS", defaults.reject_self_bids),
            extension_window_secs: env_or(
                "AUCTION_EXTENSION_WINDOW_SECS",
                defaults.extension_window_secs,
            ),
            extension_secs: env_or("AUCTION_EXTENSION_SECS", defaults.extension_secs),
            max_retries: env_or("AUCTION_MAX_RETRIES", defaults.max_retries),
            sweep_interval_secs: env_or(
                "AUCTION_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            bind_addr: std::env::var("AUCTION_BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}

/// 환경 변수 파싱, 실패 시 기본값
fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{:<12} --> 환경 변수 파싱 실패, 기본값 사용: {}", "Config", key);
                default
            }
        },
        Err(_) => default,
    }
}
// endregion: --- Engine Config
