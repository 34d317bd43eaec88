//! 저장 계층 에러 타입.

use thiserror::Error;

/// 저장소 작업 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 오류
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),

    /// 직렬화 오류
    #[error("직렬화 오류: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 저장소 내부 오류 (테스트 주입 포함)
    #[error("저장소 오류: {0}")]
    Internal(String),
}
