//! 수집기 에러 타입.

use thiserror::Error;

/// 수집기 에러.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 오류 (환경변수 누락 등)
    #[error("설정 오류: {0}")]
    Config(String),

    /// 업스트림 수집 오류
    #[error("수집 오류: {0}")]
    Provider(#[from] portal_provider::ProviderError),

    /// 저장소 오류
    #[error("저장소 오류: {0}")]
    Store(#[from] portal_store::StoreError),
}
