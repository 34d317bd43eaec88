//! 접근 토큰 캐시.
//!
//! 증권사 API는 토큰 발급 횟수를 제한하므로 발급받은 토큰을
//! 만료 추적과 함께 재사용합니다. 캐시는 핸들러 실행 컨텍스트가
//! 소유하는 주입 가능한 추상화로, 테스트 더블이 만료/갱신 동작을
//! 결정적으로 제어할 수 있습니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// 갱신 여유 시간. 만료 60초 전부터는 선제적으로 재발급합니다.
const REFRESH_MARGIN_SECS: i64 = 60;

/// 만료 추적이 포함된 토큰 상태.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenState {
    /// 접근 토큰
    pub access_token: String,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// 새 토큰 상태 생성.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// 갱신 여유를 감안해 아직 사용 가능한지 확인.
    pub fn is_usable(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }

    /// Authorization 헤더 값.
    pub fn bearer(&self) -> String {
        if self.access_token.starts_with("Bearer ") {
            self.access_token.clone()
        } else {
            format!("Bearer {}", self.access_token)
        }
    }
}

/// 토큰 저장소 추상화.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// 저장된 토큰 조회 (만료 여부와 무관하게 반환).
    async fn get(&self) -> Option<TokenState>;
    /// 새 토큰 저장.
    async fn set(&self, token: TokenState);
    /// 토큰 폐기 (401/403 수신 시 재발급 유도).
    async fn clear(&self);
}

/// 프로세스 수명 동안 유지되는 인메모리 토큰 캐시.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    token: RwLock<Option<TokenState>>,
}

impl MemoryTokenCache {
    /// 빈 캐시 생성.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self) -> Option<TokenState> {
        self.token.read().await.clone()
    }

    async fn set(&self, token: TokenState) {
        *self.token.write().await = Some(token);
    }

    async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usable_before_margin() {
        let token = TokenState::new("abc", Utc::now() + Duration::hours(1));
        assert!(token.is_usable());
    }

    #[test]
    fn test_token_not_usable_inside_margin() {
        let token = TokenState::new("abc", Utc::now() + Duration::seconds(30));
        assert!(!token.is_usable());
    }

    #[test]
    fn test_bearer_prefix_not_duplicated() {
        let plain = TokenState::new("abc", Utc::now());
        assert_eq!(plain.bearer(), "Bearer abc");

        let prefixed = TokenState::new("Bearer abc", Utc::now());
        assert_eq!(prefixed.bearer(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryTokenCache::new();
        assert!(cache.get().await.is_none());

        let token = TokenState::new("abc", Utc::now() + Duration::hours(1));
        cache.set(token.clone()).await;
        assert_eq!(cache.get().await, Some(token));

        cache.clear().await;
        assert!(cache.get().await.is_none());
    }
}
