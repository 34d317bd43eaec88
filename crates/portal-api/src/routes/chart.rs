//! 차트 프록시 endpoint.
//!
//! 증권사 일봉 차트 API를 프록시하면서 종목 코드/기간/개수를
//! 정규화하고, 응답 캔들을 표준 형태로 변환합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/chart?symbol=005930&period=day&count=120`

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use chrono_tz::Asia::Seoul;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use utoipa::IntoParams;

use portal_core::chart::{clamp_count, normalize_symbol, resolve_period_code, ChartRow};
use portal_provider::{ChartMetadata, ChartRequest};

use crate::{error::ApiError, state::AppState};

// ==================== 요청/응답 타입 ====================

/// 차트 조회 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ChartQuery {
    /// 종목 코드 (숫자 포함 임의 형식, 6자리로 정규화)
    #[serde(default)]
    pub symbol: Option<String>,
    /// 종목 코드 별칭 (symbol 부재 시 사용)
    #[serde(default)]
    pub code: Option<String>,
    /// 기간 (day/week/month/year, 기본: day)
    #[serde(default)]
    pub period: Option<String>,
    /// 기간 별칭 (period 부재 시 사용)
    #[serde(default)]
    pub timeframe: Option<String>,
    /// 캔들 개수 (20~500 범위로 제한, 기본: 120)
    #[serde(default)]
    pub count: Option<String>,
    /// 기준일 YYYYMMDD (기본: 서울 기준 오늘)
    #[serde(default)]
    pub base_date: Option<String>,
    /// 수정주가 여부 ("0"만 false, 그 외 true)
    #[serde(default, alias = "adjust", alias = "upd_stkpc_tp")]
    pub adjusted: Option<String>,
}

/// "0"만 수정주가 해제로 해석 (업스트림 upd_stkpc_tp 규약).
fn resolve_adjusted(value: Option<&str>) -> bool {
    !matches!(value.map(str::trim), Some("0"))
}

/// 차트 조회 응답.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    /// 정규화된 6자리 종목 코드
    pub symbol: String,
    /// 업스트림 기간 코드 (현재는 D만 허용)
    pub period_code: String,
    /// 반환된 캔들 수
    pub count: usize,
    /// 절단 전 수집된 캔들 수
    pub raw_count: usize,
    /// 업스트림 메타데이터
    pub metadata: ChartMetadata,
    /// 캔들 목록 (날짜 오름차순)
    pub data: Vec<ChartRow>,
}

// ==================== Handler ====================

/// 일봉 차트 조회.
///
/// GET /api/v1/chart
///
/// 데이터가 한 건도 없으면 빈 `data`와 업스트림 메타데이터를 담은
/// 200을 내려 프런트가 원인을 표시할 수 있게 합니다.
#[utoipa::path(
    get,
    path = "/api/v1/chart",
    params(ChartQuery),
    responses(
        (status = 200, description = "차트 데이터 (없으면 빈 data + 메타데이터)"),
        (status = 400, description = "잘못된 종목 코드 또는 미지원 기간", body = ApiError),
        (status = 500, description = "차트 클라이언트 미설정", body = ApiError),
        (status = 502, description = "업스트림 오류", body = ApiError)
    ),
    tag = "chart"
)]
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartResponse>, (StatusCode, Json<ApiError>)> {
    // 종목 코드 검증은 클라이언트 존재 확인보다 먼저 수행
    let symbol = query
        .symbol
        .as_deref()
        .or(query.code.as_deref())
        .and_then(normalize_symbol)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(
                    "INVALID_SYMBOL",
                    "유효한 종목 코드가 필요합니다 (예: 005930)",
                )),
            )
        })?;

    let period = query
        .period
        .as_deref()
        .or(query.timeframe.as_deref())
        .unwrap_or("day");
    let period_code = resolve_period_code(period);

    // 업스트림은 일봉 조회 API만 연동되어 있음
    if period_code != "D" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "UNSUPPORTED_PERIOD",
                "현재는 일봉(timeframe=day) 차트만 지원합니다",
            )),
        ));
    }

    let count = clamp_count(query.count.as_deref());

    let client = state.chart_client.as_ref().ok_or_else(|| {
        error!("차트 클라이언트 미설정, 조회 불가");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                "CHART_NOT_CONFIGURED",
                "증권사 차트 자격증명이 설정되지 않았습니다",
            )),
        )
    })?;

    let request = ChartRequest {
        symbol: symbol.clone(),
        count,
        base_date: query.base_date.clone().unwrap_or_else(|| {
            Utc::now().with_timezone(&Seoul).format("%Y%m%d").to_string()
        }),
        adjusted: resolve_adjusted(query.adjusted.as_deref()),
    };

    debug!(symbol = %symbol, period = period_code, count, "차트 조회 시작");

    let result = client.fetch_chart(&request).await.map_err(|e| {
        error!(symbol = %symbol, error = %e, "차트 조회 실패");
        (
            StatusCode::BAD_GATEWAY,
            Json(
                ApiError::new("CHART_UPSTREAM_ERROR", "차트 데이터 조회에 실패했습니다")
                    .with_details(e.to_string()),
            ),
        )
    })?;

    if result.rows.is_empty() {
        // 프런트가 업스트림 메시지를 표시할 수 있도록 메타데이터는 유지
        warn!(symbol = %symbol, "차트 데이터 없음");
    } else {
        debug!(
            symbol = %symbol,
            rows = result.rows.len(),
            raw = result.raw_count,
            "차트 조회 완료"
        );
    }

    Ok(Json(ChartResponse {
        symbol,
        period_code: period_code.to_string(),
        count: result.rows.len(),
        raw_count: result.raw_count,
        metadata: result.metadata,
        data: result.rows,
    }))
}

// ==================== 테스트 ====================

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::state::create_test_state;

    fn test_app() -> Router {
        Router::new()
            .route("/api/v1/chart", get(get_chart))
            .with_state(Arc::new(create_test_state()))
    }

    #[tokio::test]
    async fn test_missing_symbol_is_bad_request() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "INVALID_SYMBOL");
    }

    #[tokio::test]
    async fn test_invalid_symbol_beats_missing_client() {
        // 클라이언트가 없어도 심볼 검증이 먼저 수행되어야 함
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chart?symbol=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_symbol_without_client_is_server_error() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chart?symbol=005930")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "CHART_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_code_alias_accepted() {
        // symbol 없이 code만 넘겨도 동일하게 동작 (검증 통과 후 클라이언트 부재로 500)
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chart?code=5930&timeframe=day")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_non_daily_period_rejected() {
        // 업스트림에 일봉 API만 연동되어 있으므로 주봉/월봉 요청은 거부
        for period in ["week", "month", "year", "W"] {
            let response = test_app()
                .oneshot(
                    Request::builder()
                        .uri(&format!("/api/v1/chart?symbol=005930&period={}", period))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let error: ApiError = serde_json::from_slice(&body).unwrap();
            assert_eq!(error.code, "UNSUPPORTED_PERIOD");
        }
    }

    #[tokio::test]
    async fn test_adjusted_zero_parses_as_query() {
        // adjusted=0 문자열이 역직렬화 단계에서 탈락하면 안 됨
        // (클라이언트 부재 단계까지 도달해야 함)
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chart?symbol=005930&adjusted=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_empty_chart_served_as_ok_with_metadata() {
        use portal_provider::{BrokerageChartClient, ChartClientConfig, MemoryTokenCache};

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chart")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"return_code":"0","return_msg":"조회된 데이터가 없습니다","stk_dt_pole_chart_qry":[]}"#,
            )
            .create_async()
            .await;

        let config = ChartClientConfig {
            chart_url: format!("{}/chart", server.url()),
            api_id: "ka10081".to_string(),
            token_url: format!("{}/token", server.url()),
            app_key: String::new(),
            app_secret: String::new(),
            static_token: Some("test-token".to_string()),
            timeout_secs: 5,
        };
        let client =
            BrokerageChartClient::new(config, Arc::new(MemoryTokenCache::new())).unwrap();

        let app = Router::new()
            .route("/api/v1/chart", get(get_chart))
            .with_state(Arc::new(create_test_state().with_chart_client(client)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chart?symbol=005930")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // 빈 결과도 200: 204는 전송 계층에서 본문이 제거되어
        // 업스트림 메시지가 프런트에 도달하지 못함
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["count"], 0);
        assert!(json["data"].as_array().unwrap().is_empty());
        assert_eq!(json["metadata"]["returnMsg"], "조회된 데이터가 없습니다");
    }

    #[test]
    fn test_resolve_adjusted() {
        assert!(!resolve_adjusted(Some("0")));
        assert!(!resolve_adjusted(Some(" 0 ")));
        assert!(resolve_adjusted(Some("1")));
        assert!(resolve_adjusted(Some("true")));
        assert!(resolve_adjusted(None));
    }
}
