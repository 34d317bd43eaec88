//! API 라우트 정의.

pub mod chart;
pub mod feeds;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::state::AppState;

/// 헬스 체크.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .nest(
            "/api/v1",
            Router::new()
                .route("/chart", get(chart::get_chart))
                .nest("/feeds", feeds::feeds_router()),
        )
}
