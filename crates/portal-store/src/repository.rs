//! 스냅샷 저장소 트레이트.

use async_trait::async_trait;

use portal_core::domain::{Feed, SnapshotDocument};

use crate::error::StoreError;

/// 피드 스냅샷 저장소.
///
/// latest는 피드당 하나의 문서를 교체 저장하고,
/// 히스토리는 수집 시각 기준 append-only로 쌓입니다.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// 피드의 최신 스냅샷 조회. 없으면 `None`.
    async fn latest(&self, feed: Feed) -> Result<Option<SnapshotDocument>, StoreError>;

    /// 피드의 최신 스냅샷 교체 저장 (upsert).
    async fn replace_latest(&self, feed: Feed, doc: &SnapshotDocument) -> Result<(), StoreError>;

    /// 히스토리에 스냅샷 추가.
    async fn append_history(&self, feed: Feed, doc: &SnapshotDocument) -> Result<(), StoreError>;

    /// 히스토리 조회 (수집 시각 내림차순, 최대 `limit`건).
    async fn history(&self, feed: Feed, limit: u32) -> Result<Vec<SnapshotDocument>, StoreError>;
}
