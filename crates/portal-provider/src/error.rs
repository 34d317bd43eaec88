//! 제공자 에러 타입.

use thiserror::Error;

/// 업스트림 호출 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 네트워크/전송 오류
    #[error("네트워크 오류: {0}")]
    Network(String),

    /// 응답 본문 파싱 실패
    #[error("응답 파싱 실패: {0}")]
    Parse(String),

    /// 토큰 발급/인증 실패
    #[error("인증 실패: {0}")]
    Unauthorized(String),

    /// 필수 자격증명 환경변수 누락
    #[error("필수 환경변수 누락: {0:?}")]
    MissingCredentials(Vec<String>),

    /// 업스트림이 오류 상태 코드를 반환
    #[error("업스트림 오류 (HTTP {status}): {message}")]
    Upstream {
        /// HTTP 상태 코드
        status: u16,
        /// 업스트림이 보고한 메시지 (없으면 본문 일부)
        message: String,
    },

    /// 응답은 정상이지만 유효한 아이템이 전혀 없음
    #[error("피드 응답에 유효한 아이템이 없습니다")]
    NoData,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}
