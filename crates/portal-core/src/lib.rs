//! 주식 정보 포털의 핵심 도메인 로직.
//!
//! 스냅샷 수집 파이프라인의 순수 함수 계층입니다.
//! 외부 I/O 없이 정규화/서명/그룹핑만 담당하며,
//! 저장과 네트워크는 portal-store / portal-provider가 맡습니다.
//!
//! # 파이프라인
//!
//! ```text
//! 업스트림 JSON → 필드 정규화 (chart / theme / clone_items)
//!              → 비교 키 생성 (signature)
//!              → 변경 감지 및 저장 (portal-store)
//! 히스토리 조회 → 날짜별 그룹핑 (history)
//! ```

pub mod chart;
pub mod domain;
pub mod history;
pub mod signature;
pub mod theme;
pub mod timestamp;

pub use chart::{clamp_count, normalize_symbol, resolve_period_code, sanitize_chart_rows, ChartRow};
pub use domain::{clone_items, item_identity, Feed, FeedKind, FeedPayload, SnapshotDocument, SnapshotItem};
pub use history::{count_changed_items, group_snapshots_by_date, DateBucket};
pub use signature::{
    build_snapshot_signature, item_comparison_signature, normalize_item_for_comparison,
    normalize_items_for_comparison,
};
pub use theme::normalize_theme_leaders_items;
pub use timestamp::TimestampValue;
