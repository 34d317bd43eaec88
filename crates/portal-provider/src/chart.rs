//! 증권사 차트 API 클라이언트.
//!
//! OAuth 토큰 발급/캐싱과 일봉 차트 조회를 담당합니다.
//! 연속 조회(cont-yn / next-key)로 요청당 100건 제한을 우회하며,
//! 401/403 수신 시 토큰을 폐기하고 정확히 한 번 재시도합니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use portal_core::chart::{merge_chart_rows, sanitize_chart_rows, ChartRow};

use crate::error::ProviderError;
use crate::token::{TokenCache, TokenState};

/// 토큰 발급 기본 베이스 URL.
const DEFAULT_AUTH_BASE_URL: &str = "https://openapi.kiwoom.com:9443";
/// 토큰 발급 경로.
const TOKEN_PATH: &str = "/oauth2/tokenP";
/// expires_in이 없을 때의 토큰 수명 (8시간).
const DEFAULT_TOKEN_TTL_SECS: i64 = 8 * 60 * 60;
/// 연속 조회 최대 횟수 상한.
const MAX_CONTINUATION_REQUESTS: u32 = 20;

/// 차트 클라이언트 설정.
///
/// 모듈 전역 변수 대신 실행 컨텍스트가 소유하도록 명시적으로 주입합니다.
#[derive(Debug, Clone)]
pub struct ChartClientConfig {
    /// 차트 조회 엔드포인트 URL
    pub chart_url: String,
    /// 차트 API ID (api-id 헤더)
    pub api_id: String,
    /// 토큰 발급 엔드포인트 URL
    pub token_url: String,
    /// 앱 키
    pub app_key: String,
    /// 앱 시크릿
    pub app_secret: String,
    /// 고정 토큰 (설정 시 발급/갱신 생략)
    pub static_token: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl ChartClientConfig {
    /// 환경변수에서 설정 로드.
    ///
    /// # Errors
    /// 필수 변수가 비어 있으면 누락 목록과 함께
    /// `ProviderError::MissingCredentials`를 반환합니다.
    pub fn from_env() -> Result<Self, ProviderError> {
        let chart_url = env_trimmed("BROKER_CHART_API_URL");
        let api_id = env_trimmed("BROKER_CHART_API_ID");
        let app_key = env_trimmed("BROKER_APP_KEY");
        let app_secret = env_trimmed("BROKER_APP_SECRET");
        let static_token = Some(env_trimmed("BROKER_ACCESS_TOKEN")).filter(|s| !s.is_empty());

        let mut missing = Vec::new();
        if chart_url.is_empty() {
            missing.push("BROKER_CHART_API_URL".to_string());
        }
        if api_id.is_empty() {
            missing.push("BROKER_CHART_API_ID".to_string());
        }
        if static_token.is_none() {
            if app_key.is_empty() {
                missing.push("BROKER_APP_KEY".to_string());
            }
            if app_secret.is_empty() {
                missing.push("BROKER_APP_SECRET".to_string());
            }
        }
        if !missing.is_empty() {
            return Err(ProviderError::MissingCredentials(missing));
        }

        let token_url = {
            let explicit = env_trimmed("BROKER_TOKEN_URL");
            if !explicit.is_empty() {
                explicit
            } else {
                let base = {
                    let base = env_trimmed("BROKER_AUTH_BASE_URL");
                    if base.is_empty() {
                        DEFAULT_AUTH_BASE_URL.to_string()
                    } else {
                        base
                    }
                };
                format!("{}{}", base.trim_end_matches('/'), TOKEN_PATH)
            }
        };

        Ok(Self {
            chart_url,
            api_id,
            token_url,
            app_key,
            app_secret,
            static_token,
            timeout_secs: 10,
        })
    }
}

fn env_trimmed(key: &str) -> String {
    std::env::var(key).map(|v| v.trim().to_string()).unwrap_or_default()
}

/// 차트 조회 요청.
#[derive(Debug, Clone)]
pub struct ChartRequest {
    /// 6자리 종목 코드 (정규화 완료 상태)
    pub symbol: String,
    /// 요청 캔들 수 (정규화 완료 상태, [20, 500])
    pub count: u32,
    /// 기준일 (YYYYMMDD)
    pub base_date: String,
    /// 수정주가 여부
    pub adjusted: bool,
}

/// 차트 응답 메타데이터.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// 업스트림 응답 코드 (return_code 또는 rt_cd)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<String>,
    /// 업스트림 응답 메시지 (return_msg 또는 msg1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_msg: Option<String>,
    /// 수행한 요청 횟수
    pub request_count: u32,
    /// 마지막 연속 조회 플래그
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cont_yn: String,
    /// 마지막 연속 조회 키
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_key: String,
    /// 정규화 전 원본 레코드 총 수
    pub total_raw: usize,
}

/// 차트 조회 결과.
#[derive(Debug, Clone)]
pub struct ChartFetchResult {
    /// 정규화된 캔들 (날짜 오름차순, 요청 개수로 절단)
    pub rows: Vec<ChartRow>,
    /// 절단 전 병합된 캔들 수
    pub raw_count: usize,
    /// 업스트림 메타데이터
    pub metadata: ChartMetadata,
}

/// 토큰 발급 요청 본문.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    appkey: &'a str,
    appsecret: &'a str,
}

/// 차트 조회 요청 본문.
#[derive(Serialize)]
struct ChartRequestBody<'a> {
    stk_cd: &'a str,
    base_dt: &'a str,
    upd_stkpc_tp: &'a str,
}

/// 증권사 차트 클라이언트.
pub struct BrokerageChartClient {
    config: ChartClientConfig,
    client: reqwest::Client,
    token_cache: Arc<dyn TokenCache>,
}

impl BrokerageChartClient {
    /// 주입된 토큰 캐시로 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성 실패 시 `ProviderError::Network` 반환.
    pub fn new(
        config: ChartClientConfig,
        token_cache: Arc<dyn TokenCache>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            token_cache,
        })
    }

    /// 유효한 접근 토큰 반환.
    ///
    /// 고정 토큰이 설정되어 있으면 그대로 사용하고, 아니면 캐시를
    /// 확인한 뒤 필요 시 새로 발급합니다.
    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(static_token) = &self.config.static_token {
            let token = static_token.strip_prefix("Bearer ").unwrap_or(static_token);
            return Ok(token.to_string());
        }

        if let Some(cached) = self.token_cache.get().await {
            if cached.is_usable() {
                debug!(expires_at = %cached.expires_at, "캐시된 토큰 재사용");
                return Ok(cached.access_token);
            }
            warn!(expires_at = %cached.expires_at, "토큰 만료 임박, 재발급");
        }

        self.request_token().await
    }

    /// 새 토큰 발급.
    async fn request_token(&self) -> Result<String, ProviderError> {
        info!("접근 토큰 발급 요청");

        let body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            appsecret: &self.config.app_secret,
        };

        let response = self
            .client
            .post(&self.config.token_url)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(status = %status, body = %text, "토큰 발급 실패");
            return Err(ProviderError::Unauthorized(format!(
                "토큰 발급 실패: HTTP {} - {}",
                status, text
            )));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("토큰 응답 파싱 실패: {}", e)))?;

        let token = parsed
            .get("access_token")
            .or_else(|| parsed.get("accessToken"))
            .or_else(|| parsed.get("token"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Parse("토큰 응답에 access_token 필드가 없습니다".to_string())
            })?
            .to_string();

        let expires_in = parsed
            .get("expires_in")
            .or_else(|| parsed.get("expiresIn"))
            .and_then(Value::as_i64)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in);
        info!(expires_at = %expires_at, "접근 토큰 발급 성공");

        self.token_cache
            .set(TokenState::new(token.clone(), expires_at))
            .await;

        Ok(token)
    }

    /// 일봉 차트 조회.
    ///
    /// 연속 조회로 요청 개수를 채울 때까지 반복하되, 요청 횟수는
    /// `min(20, ceil(count/100) + 1)`로 제한합니다.
    pub async fn fetch_chart(&self, request: &ChartRequest) -> Result<ChartFetchResult, ProviderError> {
        let body = ChartRequestBody {
            stk_cd: &request.symbol,
            base_dt: &request.base_date,
            upd_stkpc_tp: if request.adjusted { "1" } else { "0" },
        };

        let max_requests = (request.count.div_ceil(100) + 1).clamp(1, MAX_CONTINUATION_REQUESTS);
        let mut rows: Vec<ChartRow> = Vec::new();
        let mut metadata = ChartMetadata::default();
        let mut cont_yn = String::new();
        let mut next_key = String::new();

        while metadata.request_count < max_requests && rows.len() < request.count as usize {
            let (status_value, parsed, headers) =
                self.chart_request_with_retry(&body, &cont_yn, &next_key).await?;

            metadata.request_count += 1;

            let list = ["stk_dt_pole_chart_qry", "output2", "output"]
                .iter()
                .find_map(|key| parsed.get(*key).and_then(Value::as_array).cloned())
                .unwrap_or_default();

            metadata.total_raw += list.len();
            rows = merge_chart_rows(rows, sanitize_chart_rows(&list));

            metadata.return_code = json_text(&parsed, &["return_code", "rt_cd"])
                .or(metadata.return_code);
            metadata.return_msg = json_text(&parsed, &["return_msg", "msg1"])
                .or(metadata.return_msg);

            cont_yn = headers
                .0
                .or_else(|| json_text(&parsed, &["cont-yn", "cont_yn", "contYn"]))
                .unwrap_or_default()
                .to_uppercase();
            next_key = headers
                .1
                .or_else(|| json_text(&parsed, &["next-key", "next_key", "nextKey"]))
                .unwrap_or_default();

            debug!(
                status = status_value,
                received = list.len(),
                accumulated = rows.len(),
                cont_yn = %cont_yn,
                "차트 페이지 수신"
            );

            if cont_yn != "Y" || next_key.is_empty() {
                break;
            }
        }

        metadata.cont_yn = cont_yn;
        metadata.next_key = next_key;

        let raw_count = rows.len();
        let limited = if raw_count > request.count as usize {
            rows.split_off(raw_count - request.count as usize)
        } else {
            rows
        };

        Ok(ChartFetchResult {
            rows: limited,
            raw_count,
            metadata,
        })
    }

    /// 차트 요청 1회 수행. 401/403이면 토큰 폐기 후 정확히 한 번 재시도.
    async fn chart_request_with_retry(
        &self,
        body: &ChartRequestBody<'_>,
        cont_yn: &str,
        next_key: &str,
    ) -> Result<(u16, Value, (Option<String>, Option<String>)), ProviderError> {
        let mut retried = false;

        loop {
            let token = self.access_token().await?;

            let mut request = self
                .client
                .post(&self.config.chart_url)
                .header("Content-Type", "application/json; charset=utf-8")
                .header("api-id", &self.config.api_id)
                .header("authorization", format!("Bearer {}", token));

            if cont_yn == "Y" {
                request = request.header("cont-yn", "Y");
            }
            if !next_key.is_empty() {
                request = request.header("next-key", next_key);
            }

            let response = request.json(body).send().await?;
            let status = response.status();

            if (status.as_u16() == 401 || status.as_u16() == 403)
                && !retried
                && self.config.static_token.is_none()
            {
                warn!(status = %status, "인증 오류, 토큰 갱신 후 재시도");
                self.token_cache.clear().await;
                retried = true;
                continue;
            }

            let header_cont = header_text(&response, "cont-yn");
            let header_next = header_text(&response, "next-key");
            let text = response.text().await?;

            if !status.is_success() {
                return Err(ProviderError::Upstream {
                    status: status.as_u16(),
                    message: if text.is_empty() {
                        "응답 본문 없음".to_string()
                    } else {
                        text
                    },
                });
            }

            let parsed: Value = if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or_else(|e| {
                    error!(error = %e, "차트 응답 JSON 파싱 실패");
                    Value::Null
                })
            };

            return Ok((status.as_u16(), parsed, (header_cont, header_next)));
        }
    }
}

/// 응답 헤더 값 추출 (없으면 None).
fn header_text(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// JSON에서 앨리어스 키 중 첫 문자열 값 추출.
fn json_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value.get(*key).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenCache;

    fn test_config(server_url: &str) -> ChartClientConfig {
        ChartClientConfig {
            chart_url: format!("{}/chart", server_url),
            api_id: "ka10081".to_string(),
            token_url: format!("{}/oauth2/tokenP", server_url),
            app_key: "test-app-key".to_string(),
            app_secret: "test-app-secret".to_string(),
            static_token: None,
            timeout_secs: 5,
        }
    }

    fn test_request() -> ChartRequest {
        ChartRequest {
            symbol: "005930".to_string(),
            count: 120,
            base_date: "20240102".to_string(),
            adjusted: true,
        }
    }

    #[tokio::test]
    async fn test_fetch_chart_issues_token_then_chart() {
        let mut server = mockito::Server::new_async().await;

        let token_mock = server
            .mock("POST", "/oauth2/tokenP")
            .with_status(200)
            .with_body(r#"{"access_token": "tok-1", "expires_in": 3600}"#)
            .expect(1)
            .create_async()
            .await;

        let chart_mock = server
            .mock("POST", "/chart")
            .match_header("authorization", "Bearer tok-1")
            .match_header("api-id", "ka10081")
            .with_status(200)
            .with_body(
                r#"{"return_code": "0", "return_msg": "정상",
                    "stk_dt_pole_chart_qry": [
                        {"cur_prc": "71000", "open_pric": "70500", "stck_bsop_date": "20240102", "trde_qty": "1000"},
                        {"cur_prc": "70900", "stck_bsop_date": "20240101"}
                    ]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let cache = Arc::new(MemoryTokenCache::new());
        let client = BrokerageChartClient::new(test_config(&server.url()), cache.clone())
            .expect("클라이언트 생성");

        let result = client.fetch_chart(&test_request()).await.expect("조회 성공");

        token_mock.assert_async().await;
        chart_mock.assert_async().await;

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].date, "2024-01-01");
        assert_eq!(result.rows[1].date, "2024-01-02");
        assert_eq!(result.metadata.return_code.as_deref(), Some("0"));
        // 토큰이 캐시에 저장되어야 함
        assert!(cache.get().await.is_some());
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token_once() {
        let mut server = mockito::Server::new_async().await;

        let token_mock = server
            .mock("POST", "/oauth2/tokenP")
            .with_status(200)
            .with_body(r#"{"access_token": "tok-2", "expires_in": 3600}"#)
            .expect(2)
            .create_async()
            .await;

        // 401 → 토큰 폐기 후 한 번 재시도, 다시 401이면 포기 (총 2회)
        let denied = server
            .mock("POST", "/chart")
            .with_status(401)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let cache = Arc::new(MemoryTokenCache::new());
        let client = BrokerageChartClient::new(test_config(&server.url()), cache)
            .expect("클라이언트 생성");

        // 두 번째 요청도 401이면 Upstream 에러로 종료 (무한 재시도 금지)
        let err = client.fetch_chart(&test_request()).await.expect_err("실패해야 함");
        denied.assert_async().await;
        token_mock.assert_async().await;

        match err {
            ProviderError::Upstream { status, .. } => assert_eq!(status, 401),
            other => panic!("예상과 다른 에러: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_token_skips_token_endpoint() {
        let mut server = mockito::Server::new_async().await;

        let token_mock = server
            .mock("POST", "/oauth2/tokenP")
            .expect(0)
            .create_async()
            .await;

        let chart_mock = server
            .mock("POST", "/chart")
            .match_header("authorization", "Bearer static-tok")
            .with_status(200)
            .with_body(r#"{"stk_dt_pole_chart_qry": []}"#)
            .create_async()
            .await;

        let mut config = test_config(&server.url());
        config.static_token = Some("Bearer static-tok".to_string());

        let client = BrokerageChartClient::new(config, Arc::new(MemoryTokenCache::new()))
            .expect("클라이언트 생성");

        let result = client.fetch_chart(&test_request()).await.expect("조회 성공");
        assert!(result.rows.is_empty());

        token_mock.assert_async().await;
        chart_mock.assert_async().await;
    }
}
