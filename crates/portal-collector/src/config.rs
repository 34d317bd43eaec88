//! 수집기 설정.

use std::time::Duration;

use crate::error::CollectorError;

/// 수집기 설정.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 업스트림 피드 베이스 URL
    pub feed_base_url: String,
    /// 데이터베이스 URL
    pub database_url: String,
    /// 피드 간 요청 지연 (밀리초)
    pub request_delay_ms: u64,
    /// 업스트림 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 데몬 모드 수집 주기 (분)
    pub interval_minutes: u64,
    /// 수집 대상 피드 필터 (쉼표 구분 slug, 없으면 전체)
    pub feeds: Option<String>,
}

impl CollectorConfig {
    /// 환경 변수에서 설정 로드.
    ///
    /// # Errors
    /// `FEED_BASE_URL` 또는 `DATABASE_URL`이 없으면
    /// `CollectorError::Config`를 반환합니다.
    pub fn from_env() -> Result<Self, CollectorError> {
        let feed_base_url = std::env::var("FEED_BASE_URL")
            .map_err(|_| CollectorError::Config("FEED_BASE_URL 환경변수가 필요합니다".to_string()))?;
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| CollectorError::Config("DATABASE_URL 환경변수가 필요합니다".to_string()))?;

        let request_delay_ms = env_parsed("COLLECT_REQUEST_DELAY_MS", 500);
        let request_timeout_secs = env_parsed("COLLECT_REQUEST_TIMEOUT_SECS", 15);
        let interval_minutes = env_parsed("COLLECT_INTERVAL_MINUTES", 60);
        let feeds = std::env::var("COLLECT_FEEDS").ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            feed_base_url,
            database_url,
            request_delay_ms,
            request_timeout_secs,
            interval_minutes,
            feeds,
        })
    }

    /// 데몬 수집 주기.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// 피드 간 지연.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
