//! 인메모리 스냅샷 저장소.
//!
//! 데이터베이스 없이 기동하는 개발 모드와 테스트에서 사용합니다.
//! 테스트용 실패 주입 플래그로 읽기/쓰기 오류 시나리오를 재현할 수 있습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use portal_core::domain::{Feed, SnapshotDocument};

use crate::error::StoreError;
use crate::repository::SnapshotRepository;

/// 인메모리 저장소.
#[derive(Default)]
pub struct MemorySnapshotRepository {
    latest: RwLock<HashMap<&'static str, SnapshotDocument>>,
    history: RwLock<HashMap<&'static str, Vec<SnapshotDocument>>>,
    fail_reads: AtomicBool,
    fail_latest_writes: AtomicBool,
    fail_history_writes: AtomicBool,
}

impl MemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이후의 latest 조회를 실패시킨다 (테스트 전용).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 이후의 latest 쓰기를 실패시킨다 (테스트 전용).
    pub fn fail_latest_writes(&self, fail: bool) {
        self.fail_latest_writes.store(fail, Ordering::SeqCst);
    }

    /// 이후의 히스토리 쓰기를 실패시킨다 (테스트 전용).
    pub fn fail_history_writes(&self, fail: bool) {
        self.fail_history_writes.store(fail, Ordering::SeqCst);
    }

    /// 히스토리 총 건수 (테스트 전용).
    pub async fn history_len(&self, feed: Feed) -> usize {
        self.history
            .read()
            .await
            .get(feed.slug())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotRepository for MemorySnapshotRepository {
    async fn latest(&self, feed: Feed) -> Result<Option<SnapshotDocument>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("주입된 읽기 실패".to_string()));
        }
        Ok(self.latest.read().await.get(feed.slug()).cloned())
    }

    async fn replace_latest(&self, feed: Feed, doc: &SnapshotDocument) -> Result<(), StoreError> {
        if self.fail_latest_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("주입된 latest 쓰기 실패".to_string()));
        }
        self.latest.write().await.insert(feed.slug(), doc.clone());
        Ok(())
    }

    async fn append_history(&self, feed: Feed, doc: &SnapshotDocument) -> Result<(), StoreError> {
        if self.fail_history_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("주입된 히스토리 쓰기 실패".to_string()));
        }
        self.history
            .write()
            .await
            .entry(feed.slug())
            .or_default()
            .push(doc.clone());
        Ok(())
    }

    async fn history(&self, feed: Feed, limit: u32) -> Result<Vec<SnapshotDocument>, StoreError> {
        let guard = self.history.read().await;
        let mut docs = guard.get(feed.slug()).cloned().unwrap_or_default();
        // 수집 시각 내림차순, 시각 없는 문서는 뒤로
        docs.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        docs.truncate(limit as usize);
        Ok(docs)
    }
}
