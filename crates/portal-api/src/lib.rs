//! 주식 정보 포털 API 서버 라이브러리.
//!
//! 피드 스냅샷 조회/수집, 차트 프록시, 히스토리 조회 엔드포인트를
//! 제공합니다.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;
