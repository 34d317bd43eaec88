//! 스냅샷 저장 계층.
//!
//! 피드 스냅샷의 "latest" 교체 저장과 히스토리 누적 저장을 담당합니다.
//! 저장소 구현은 `SnapshotRepository` 트레이트 뒤에 숨기며,
//! 운영은 PostgreSQL(JSONB), 테스트는 인메모리 구현을 사용합니다.

pub mod error;
pub mod gate;
pub mod memory;
pub mod persist;
pub mod postgres;
pub mod repository;

pub use error::StoreError;
pub use gate::FetchGate;
pub use memory::MemorySnapshotRepository;
pub use persist::{persist_if_changed, PersistOutcome};
pub use postgres::PostgresSnapshotRepository;
pub use repository::SnapshotRepository;
