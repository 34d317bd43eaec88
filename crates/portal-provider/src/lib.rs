//! 업스트림 데이터 제공자.
//!
//! 증권사 OAuth + 차트 API 프록시 클라이언트와 피드 엔드포인트
//! 클라이언트를 제공합니다. 응답 페이로드의 정규화는 portal-core가
//! 담당하며, 이 크레이트는 네트워크와 인증만 다룹니다.

pub mod chart;
pub mod error;
pub mod feeds;
pub mod token;

pub use chart::{BrokerageChartClient, ChartClientConfig, ChartFetchResult, ChartMetadata, ChartRequest};
pub use error::ProviderError;
pub use feeds::FeedClient;
pub use token::{MemoryTokenCache, TokenCache, TokenState};
