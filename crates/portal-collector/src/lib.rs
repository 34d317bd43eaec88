//! Standalone snapshot collector.
//!
//! API 서버와 독립적으로 피드 스냅샷을 주기 수집해 저장소에
//! 적재합니다.

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::CollectorError;
pub use stats::RefreshStats;
