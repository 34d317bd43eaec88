//! API 에러 응답 타입.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 표준 에러 응답 본문.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// 기계 판독용 에러 코드 (예: INVALID_SYMBOL)
    pub code: String,
    /// 사람이 읽을 메시지
    pub message: String,
    /// 업스트림 상세 (있는 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
