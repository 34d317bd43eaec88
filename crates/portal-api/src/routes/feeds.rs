//! 피드 스냅샷 endpoint.
//!
//! 업스트림 수집과 저장, 최신/히스토리 조회를 제공합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/feeds/{feed}` - 수집 후 최신 스냅샷 반환 (쿨다운 적용)
//! - `GET /api/v1/feeds/{feed}/latest` - 저장된 최신 스냅샷 조회
//! - `GET /api/v1/feeds/{feed}/history` - 날짜별 그룹 히스토리 조회

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::IntoParams;

use portal_core::domain::{Feed, SnapshotDocument};
use portal_core::history::DateBucket;
use portal_core::signature::build_snapshot_signature;
use portal_core::group_snapshots_by_date;
use portal_store::{persist_if_changed, PersistOutcome};

use crate::{error::ApiError, state::AppState};

/// 히스토리 조회 기본 건수.
const DEFAULT_HISTORY_LIMIT: u32 = 200;
/// 히스토리 조회 최대 건수.
const MAX_HISTORY_LIMIT: u32 = 500;

// ==================== 응답 타입 ====================

/// 수집 응답.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRefreshResponse {
    /// 피드 식별자 (slug)
    pub feed: String,
    /// 이번 요청에서 업스트림 수집을 수행했는지
    pub refreshed: bool,
    /// 제공자 기준 시각 라벨
    pub as_of: String,
    /// 표시용 라벨
    pub as_of_label: String,
    /// 정규화된 아이템 목록
    pub items: Vec<Value>,
    /// 저장 결과 (수집한 경우에만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PersistOutcome>,
    /// 수집/저장 경고 (응답 자체는 성공)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// 히스토리 응답.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedHistoryResponse {
    /// 피드 식별자 (slug)
    pub feed: String,
    /// 날짜별 버킷 (최신 날짜 우선)
    pub buckets: Vec<DateBucket>,
}

/// 히스토리 조회 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// 최대 문서 수 (기본 200, 최대 500)
    #[serde(default)]
    pub limit: Option<u32>,
}

// ==================== Handler ====================

/// 저장된 스냅샷의 정규 서명 계산.
fn stored_signature(feed: Feed, doc: &SnapshotDocument) -> String {
    let items = feed.kind().normalize(&doc.items);
    let label = feed.signature_label(&doc.as_of, &doc.as_of_label);
    build_snapshot_signature(&label, &items)
}

/// 저장된 최신 스냅샷으로 응답 구성.
fn response_from_stored(
    feed: Feed,
    doc: SnapshotDocument,
    warning: Option<String>,
) -> FeedRefreshResponse {
    FeedRefreshResponse {
        feed: feed.slug().to_string(),
        refreshed: false,
        as_of: doc.as_of,
        as_of_label: doc.as_of_label,
        items: doc.items,
        outcome: None,
        warning,
    }
}

fn unknown_feed(slug: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(
            "UNKNOWN_FEED",
            format!("알 수 없는 피드입니다: {}", slug),
        )),
    )
}

/// 피드 수집 후 최신 스냅샷 반환.
///
/// GET /api/v1/feeds/{feed}
///
/// 쿨다운 내의 반복 요청은 업스트림 호출 없이 저장된 최신 스냅샷을
/// 반환합니다. 수집에 실패해도 저장된 스냅샷이 있으면 경고와 함께
/// 그것을 반환합니다 (수집 실패와 저장 실패는 경고 문구로 구분).
#[utoipa::path(
    get,
    path = "/api/v1/feeds/{feed}",
    params(("feed" = String, Path, description = "피드 slug")),
    responses(
        (status = 200, description = "스냅샷"),
        (status = 404, description = "알 수 없는 피드", body = ApiError),
        (status = 502, description = "업스트림 오류 (저장된 스냅샷 없음)", body = ApiError),
        (status = 503, description = "업스트림 미설정 (저장된 스냅샷 없음)", body = ApiError)
    ),
    tag = "feeds"
)]
pub async fn refresh_feed(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<FeedRefreshResponse>, (StatusCode, Json<ApiError>)> {
    let feed = Feed::from_slug(&slug).ok_or_else(|| unknown_feed(&slug))?;

    // 읽기 실패는 "저장된 것 없음"과 동일하게 취급
    let stored = state.repository.latest(feed).await.unwrap_or_else(|e| {
        warn!(feed = feed.slug(), error = %e, "최신 스냅샷 조회 실패");
        None
    });
    let signature = stored.as_ref().map(|doc| stored_signature(feed, doc));

    let Some(client) = state.feed_client.as_ref() else {
        return match stored {
            Some(doc) => Ok(Json(response_from_stored(
                feed,
                doc,
                Some("업스트림 수집 URL이 설정되지 않았습니다".to_string()),
            ))),
            None => Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError::new(
                    "FEED_NOT_CONFIGURED",
                    "업스트림 수집 URL이 설정되지 않았습니다",
                )),
            )),
        };
    };

    // 쿨다운 게이트: 저장된 서명이 바뀌지 않았고 쿨다운 중이면 생략
    if !state.gate.should_fetch(feed, signature.as_deref()).await {
        if let Some(doc) = stored {
            debug!(feed = feed.slug(), "쿨다운 중, 저장된 스냅샷 반환");
            return Ok(Json(response_from_stored(feed, doc, None)));
        }
    }

    let payload = match client.fetch(feed).await {
        Ok(payload) => payload,
        Err(error) => {
            warn!(feed = feed.slug(), error = %error, "피드 수집 실패");
            return match stored {
                Some(doc) => Ok(Json(response_from_stored(
                    feed,
                    doc,
                    Some(format!("수집 실패: {}", error)),
                ))),
                None => Err((
                    StatusCode::BAD_GATEWAY,
                    Json(
                        ApiError::new("FEED_UPSTREAM_ERROR", "피드 수집에 실패했습니다")
                            .with_details(error.to_string()),
                    ),
                )),
            };
        }
    };

    let outcome = persist_if_changed(state.repository.as_ref(), feed, &payload).await;

    let items = feed.kind().normalize(&payload.items);
    let label = feed.signature_label(
        payload.as_of_value(),
        payload.as_of_label.as_deref().unwrap_or(""),
    );
    state
        .gate
        .record(feed, build_snapshot_signature(&label, &items))
        .await;

    let warning = match &outcome {
        PersistOutcome::Failed { message, .. } => {
            Some(format!("수집은 성공했으나 저장 실패: {}", message))
        }
        _ => None,
    };

    info!(
        feed = feed.slug(),
        items = items.len(),
        outcome = ?outcome,
        "피드 수집 완료"
    );

    Ok(Json(FeedRefreshResponse {
        feed: feed.slug().to_string(),
        refreshed: true,
        as_of: payload.as_of_value().to_string(),
        as_of_label: payload.display_label().to_string(),
        items,
        outcome: Some(outcome),
        warning,
    }))
}

/// 저장된 최신 스냅샷 조회.
///
/// GET /api/v1/feeds/{feed}/latest
#[utoipa::path(
    get,
    path = "/api/v1/feeds/{feed}/latest",
    params(("feed" = String, Path, description = "피드 slug")),
    responses(
        (status = 200, description = "최신 스냅샷"),
        (status = 404, description = "스냅샷 없음", body = ApiError)
    ),
    tag = "feeds"
)]
pub async fn get_latest(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SnapshotDocument>, (StatusCode, Json<ApiError>)> {
    let feed = Feed::from_slug(&slug).ok_or_else(|| unknown_feed(&slug))?;

    let doc = state
        .repository
        .latest(feed)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new("STORE_ERROR", e.to_string())),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(
                    "SNAPSHOT_NOT_FOUND",
                    format!("저장된 스냅샷이 없습니다: {}", feed.slug()),
                )),
            )
        })?;

    Ok(Json(doc))
}

/// 날짜별 그룹 히스토리 조회.
///
/// GET /api/v1/feeds/{feed}/history
///
/// 서울 달력일 기준으로 그룹화하며, 날짜를 알 수 없는 문서는
/// 마지막 버킷에 모입니다.
#[utoipa::path(
    get,
    path = "/api/v1/feeds/{feed}/history",
    params(("feed" = String, Path, description = "피드 slug"), HistoryQuery),
    responses(
        (status = 200, description = "날짜별 히스토리"),
        (status = 404, description = "알 수 없는 피드", body = ApiError)
    ),
    tag = "feeds"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<FeedHistoryResponse>, (StatusCode, Json<ApiError>)> {
    let feed = Feed::from_slug(&slug).ok_or_else(|| unknown_feed(&slug))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let snapshots = state.repository.history(feed, limit).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new("STORE_ERROR", e.to_string())),
        )
    })?;

    let buckets = group_snapshots_by_date(&snapshots);

    debug!(
        feed = feed.slug(),
        snapshots = snapshots.len(),
        buckets = buckets.len(),
        "히스토리 조회 완료"
    );

    Ok(Json(FeedHistoryResponse {
        feed: feed.slug().to_string(),
        buckets,
    }))
}

// ==================== 라우터 ====================

/// 피드 라우터 생성.
pub fn feeds_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{feed}", get(refresh_feed))
        .route("/{feed}/latest", get(get_latest))
        .route("/{feed}/history", get(get_history))
}

// ==================== 테스트 ====================

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tower::ServiceExt;

    use portal_store::SnapshotRepository;

    use super::*;
    use crate::state::{create_test_state, create_test_state_with_repo};

    fn app(state: AppState) -> Router {
        Router::new()
            .nest("/api/v1/feeds", feeds_router())
            .with_state(Arc::new(state))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    fn sample_doc(as_of: &str, day: u32, hour: u32) -> SnapshotDocument {
        SnapshotDocument {
            as_of: as_of.to_string(),
            as_of_label: as_of.to_string(),
            items: vec![json!({"rank": 1, "name": "삼성전자", "code": "005930"})],
            collected_at: Some(Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_unknown_feed_is_not_found() {
        let (status, body) = get_json(app(create_test_state()), "/api/v1/feeds/no-such-feed").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "UNKNOWN_FEED");
    }

    #[tokio::test]
    async fn test_refresh_without_upstream_or_data_is_unavailable() {
        let (status, body) = get_json(app(create_test_state()), "/api/v1/feeds/popular-stocks").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "FEED_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_refresh_without_upstream_serves_stored_snapshot() {
        let (state, repo) = create_test_state_with_repo();
        repo.replace_latest(Feed::PopularStocks, &sample_doc("10:00", 2, 1))
            .await
            .unwrap();

        let (status, body) = get_json(app(state), "/api/v1/feeds/popular-stocks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refreshed"], false);
        assert_eq!(body["asOf"], "10:00");
        assert!(body["warning"].as_str().unwrap().contains("설정"));
    }

    #[tokio::test]
    async fn test_latest_not_found() {
        let (status, body) =
            get_json(app(create_test_state()), "/api/v1/feeds/theme-leaders/latest").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SNAPSHOT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_latest_returns_stored_document() {
        let (state, repo) = create_test_state_with_repo();
        repo.replace_latest(Feed::ForeignNetBuy, &sample_doc("10:00", 2, 1))
            .await
            .unwrap();

        let (status, body) = get_json(app(state), "/api/v1/feeds/foreign-net-buy/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["asOf"], "10:00");
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_groups_by_seoul_date() {
        let (state, repo) = create_test_state_with_repo();
        // UTC 1일 23시 = 서울 2일 08시, UTC 2일 05시 = 서울 2일 14시
        repo.append_history(Feed::ForeignNetBuy, &sample_doc("08:00", 1, 23))
            .await
            .unwrap();
        repo.append_history(Feed::ForeignNetBuy, &sample_doc("14:00", 2, 5))
            .await
            .unwrap();

        let (status, body) = get_json(app(state), "/api/v1/feeds/foreign-net-buy/history").await;
        assert_eq!(status, StatusCode::OK);

        let buckets = body["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0]["dateKey"], "2024-01-02");
        assert_eq!(buckets[0]["snapshots"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_empty_is_ok() {
        let (status, body) =
            get_json(app(create_test_state()), "/api/v1/feeds/popular-stocks/history").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["buckets"].as_array().unwrap().is_empty());
    }
}
