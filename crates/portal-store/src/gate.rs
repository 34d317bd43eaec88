//! 수집 쿨다운 게이트.
//!
//! 피드별로 마지막 수집 시각과 당시 서명을 기억해, 쿨다운 내의
//! 재수집 요청을 차단합니다. 프로세스 로컬 상태이므로 다중 인스턴스
//! 배포에서는 인스턴스마다 독립적으로 동작합니다. 저장된 최신 서명이
//! 기록과 달라지면 (다른 경로로 저장이 일어난 경우) 게이트를 다시 엽니다.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use portal_core::domain::Feed;

/// 기본 쿨다운 (1시간).
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

struct GateEntry {
    fetched_at: Instant,
    signature: String,
}

/// 피드 수집 게이트.
pub struct FetchGate {
    cooldown: Duration,
    entries: RwLock<HashMap<&'static str, GateEntry>>,
}

impl Default for FetchGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchGate {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 수집을 진행해야 하는지 판단.
    ///
    /// `latest_signature`는 저장소에서 조회한 현재 최신 스냅샷의
    /// 서명입니다. 기록된 서명과 다르면 쿨다운과 무관하게 수집합니다.
    pub async fn should_fetch(&self, feed: Feed, latest_signature: Option<&str>) -> bool {
        let guard = self.entries.read().await;
        let Some(entry) = guard.get(feed.slug()) else {
            return true;
        };

        if let Some(latest) = latest_signature {
            if latest != entry.signature {
                debug!(feed = feed.slug(), "최신 서명 변경 감지, 게이트 개방");
                return true;
            }
        }

        let elapsed = entry.fetched_at.elapsed();
        if elapsed >= self.cooldown {
            return true;
        }

        debug!(
            feed = feed.slug(),
            remaining_secs = (self.cooldown - elapsed).as_secs(),
            "쿨다운 중, 수집 생략"
        );
        false
    }

    /// 수집 완료 기록.
    pub async fn record(&self, feed: Feed, signature: String) {
        self.entries.write().await.insert(
            feed.slug(),
            GateEntry {
                fetched_at: Instant::now(),
                signature,
            },
        );
    }

    /// 기록 삭제 (테스트/수동 초기화용).
    pub async fn reset(&self, feed: Feed) {
        self.entries.write().await.remove(feed.slug());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_fetch_allowed() {
        let gate = FetchGate::new();
        assert!(gate.should_fetch(Feed::PopularStocks, None).await);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_repeat() {
        let gate = FetchGate::new();
        gate.record(Feed::PopularStocks, "sig-a".to_string()).await;
        assert!(!gate.should_fetch(Feed::PopularStocks, Some("sig-a")).await);
    }

    #[tokio::test]
    async fn test_signature_change_reopens_gate() {
        let gate = FetchGate::new();
        gate.record(Feed::PopularStocks, "sig-a".to_string()).await;
        assert!(gate.should_fetch(Feed::PopularStocks, Some("sig-b")).await);
    }

    #[tokio::test]
    async fn test_elapsed_cooldown_allows_fetch() {
        let gate = FetchGate::with_cooldown(Duration::from_secs(0));
        gate.record(Feed::PopularStocks, "sig-a".to_string()).await;
        assert!(gate.should_fetch(Feed::PopularStocks, Some("sig-a")).await);
    }

    #[tokio::test]
    async fn test_feeds_gate_independently() {
        let gate = FetchGate::new();
        gate.record(Feed::PopularStocks, "sig-a".to_string()).await;
        assert!(gate.should_fetch(Feed::ThemeLeaders, None).await);
    }
}
