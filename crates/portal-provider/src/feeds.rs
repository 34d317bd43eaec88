//! 피드 수집 HTTP 클라이언트.
//!
//! 업스트림 수집 함수 엔드포인트에서 피드 스냅샷을 가져옵니다.
//! 응답 Content-Type이 부정확한 경우가 있어 본문을 항상 텍스트로
//! 받은 뒤 JSON 파싱을 시도합니다.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};

use portal_core::domain::{Feed, FeedPayload};

use crate::error::ProviderError;

/// 피드 클라이언트.
pub struct FeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl FeedClient {
    /// 베이스 URL로 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성 실패 시 `ProviderError::Network` 반환.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// 피드 스냅샷 조회.
    ///
    /// # Errors
    /// - 비 2xx 응답은 본문의 error/message 필드를 담아 `Upstream`
    /// - 본문 파싱 실패는 `Parse`
    /// - 아이템이 전혀 없으면 `NoData`
    pub async fn fetch(&self, feed: Feed) -> Result<FeedPayload, ProviderError> {
        let url = format!("{}/{}", self.base_url, feed.slug());
        debug!(feed = feed.slug(), url = %url, "피드 조회 시작");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = extract_error_message(&text)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            error!(feed = feed.slug(), status = %status, message = %message, "피드 조회 실패");
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let payload: FeedPayload = serde_json::from_str(&text).map_err(|e| {
            error!(feed = feed.slug(), error = %e, "피드 응답 파싱 실패");
            ProviderError::Parse(format!("피드 응답 파싱 실패: {}", e))
        })?;

        if payload.items.is_empty() {
            return Err(ProviderError::NoData);
        }

        info!(
            feed = feed.slug(),
            items = payload.items.len(),
            as_of = payload.as_of.as_deref().unwrap_or("-"),
            "피드 조회 완료"
        );
        Ok(payload)
    }
}

/// 에러 응답 본문에서 사람이 읽을 메시지 추출.
fn extract_error_message(text: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(text).ok()?;
    ["error", "message", "detail"].iter().find_map(|key| {
        parsed
            .get(*key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}
