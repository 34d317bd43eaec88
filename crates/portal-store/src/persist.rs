//! 변경 감지 저장 (중복 제거 파이프라인).
//!
//! 새 스냅샷의 정규 서명을 저장된 최신 스냅샷의 서명과 비교해
//! 내용이 같으면 저장을 생략합니다. 저장 시에는 latest 교체와
//! 히스토리 추가를 동시에 수행하며, 두 쓰기는 의도적으로 트랜잭션으로
//! 묶지 않습니다. 한쪽만 성공해도 다음 주기에 서명 비교로 수렴합니다.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use portal_core::domain::{Feed, FeedPayload, SnapshotDocument};
use portal_core::signature::build_snapshot_signature;

use crate::repository::SnapshotRepository;

/// 저장 시도 결과.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PersistOutcome {
    /// 새 스냅샷을 저장함
    Stored,
    /// 최신 스냅샷과 동일하여 생략
    Skipped,
    /// 저장 중 일부 또는 전체 실패
    #[serde(rename_all = "camelCase")]
    Failed {
        stored_latest: bool,
        stored_history: bool,
        message: String,
    },
}

impl PersistOutcome {
    /// 새 스냅샷이 실제로 기록되었는지 (부분 기록 포함).
    pub fn wrote_anything(&self) -> bool {
        match self {
            PersistOutcome::Stored => true,
            PersistOutcome::Skipped => false,
            PersistOutcome::Failed {
                stored_latest,
                stored_history,
                ..
            } => *stored_latest || *stored_history,
        }
    }
}

/// 페이로드를 정규화해 서명을 비교하고, 달라졌을 때만 저장.
///
/// 최신 스냅샷 읽기에 실패하면 "저장된 것 없음"으로 간주하고
/// 진행합니다. 중복 저장은 다음 비교에서 걸러지므로 안전합니다.
pub async fn persist_if_changed(
    repository: &dyn SnapshotRepository,
    feed: Feed,
    payload: &FeedPayload,
) -> PersistOutcome {
    let items = feed.kind().normalize(&payload.items);
    let label = feed.signature_label(
        payload.as_of_value(),
        payload.as_of_label.as_deref().unwrap_or(""),
    );
    let signature = build_snapshot_signature(&label, &items);

    match repository.latest(feed).await {
        Ok(Some(stored)) => {
            let stored_items = feed.kind().normalize(&stored.items);
            let stored_label = feed.signature_label(&stored.as_of, &stored.as_of_label);
            let stored_signature = build_snapshot_signature(&stored_label, &stored_items);

            if stored_signature == signature {
                info!(feed = feed.slug(), "스냅샷 변경 없음, 저장 생략");
                return PersistOutcome::Skipped;
            }
        }
        Ok(None) => {}
        Err(error) => {
            warn!(feed = feed.slug(), error = %error, "최신 스냅샷 조회 실패, 저장 강행");
        }
    }

    let document = SnapshotDocument {
        as_of: payload.as_of_value().to_string(),
        as_of_label: payload.display_label().to_string(),
        items,
        collected_at: Some(Utc::now()),
    };

    let (latest_result, history_result) = tokio::join!(
        repository.replace_latest(feed, &document),
        repository.append_history(feed, &document),
    );

    let stored_latest = latest_result.is_ok();
    let stored_history = history_result.is_ok();

    if stored_latest && stored_history {
        info!(
            feed = feed.slug(),
            items = document.items.len(),
            "새 스냅샷 저장 완료"
        );
        return PersistOutcome::Stored;
    }

    let message = [
        latest_result.err().map(|e| format!("latest: {}", e)),
        history_result.err().map(|e| format!("history: {}", e)),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("; ");

    warn!(
        feed = feed.slug(),
        stored_latest,
        stored_history,
        message = %message,
        "스냅샷 저장 부분 실패"
    );

    PersistOutcome::Failed {
        stored_latest,
        stored_history,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::memory::MemorySnapshotRepository;

    fn payload(items: Vec<serde_json::Value>, as_of: &str) -> FeedPayload {
        FeedPayload {
            items,
            as_of: Some(as_of.to_string()),
            as_of_label: None,
        }
    }

    fn sample_items() -> Vec<serde_json::Value> {
        vec![
            json!({"rank": 1, "name": "삼성전자", "code": "005930"}),
            json!({"rank": 2, "name": "SK하이닉스", "code": "000660"}),
        ]
    }

    #[tokio::test]
    async fn test_first_persist_stores() {
        let repo = MemorySnapshotRepository::new();
        let outcome =
            persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "10:00"))
                .await;

        assert!(matches!(outcome, PersistOutcome::Stored));
        assert!(repo.latest(Feed::ForeignNetBuy).await.unwrap().is_some());
        assert_eq!(repo.history_len(Feed::ForeignNetBuy).await, 1);
    }

    #[tokio::test]
    async fn test_identical_snapshot_is_skipped() {
        let repo = MemorySnapshotRepository::new();
        let p = payload(sample_items(), "10:00");

        persist_if_changed(&repo, Feed::ForeignNetBuy, &p).await;
        let outcome = persist_if_changed(&repo, Feed::ForeignNetBuy, &p).await;

        assert!(matches!(outcome, PersistOutcome::Skipped));
        assert_eq!(repo.history_len(Feed::ForeignNetBuy).await, 1);
    }

    #[tokio::test]
    async fn test_reordered_items_are_skipped() {
        let repo = MemorySnapshotRepository::new();
        let mut reordered = sample_items();
        reordered.reverse();

        persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "10:00")).await;
        let outcome =
            persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(reordered, "10:00")).await;

        assert!(matches!(outcome, PersistOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_changed_label_stores_again() {
        let repo = MemorySnapshotRepository::new();
        persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "10:00")).await;
        let outcome =
            persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "11:00"))
                .await;

        assert!(matches!(outcome, PersistOutcome::Stored));
        assert_eq!(repo.history_len(Feed::ForeignNetBuy).await, 2);
    }

    #[tokio::test]
    async fn test_read_failure_still_stores() {
        let repo = MemorySnapshotRepository::new();
        persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "10:00")).await;

        // 읽기만 실패시키면 동일 내용이라도 저장이 진행되어야 함
        repo.fail_reads(true);
        let outcome =
            persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "10:00"))
                .await;

        assert!(matches!(outcome, PersistOutcome::Stored));
        assert_eq!(repo.history_len(Feed::ForeignNetBuy).await, 2);
    }

    #[tokio::test]
    async fn test_partial_write_reports_both_flags() {
        let repo = MemorySnapshotRepository::new();
        repo.fail_history_writes(true);

        let outcome =
            persist_if_changed(&repo, Feed::ForeignNetBuy, &payload(sample_items(), "10:00"))
                .await;

        match outcome {
            PersistOutcome::Failed {
                stored_latest,
                stored_history,
                ..
            } => {
                assert!(stored_latest);
                assert!(!stored_history);
            }
            other => panic!("예상과 다른 결과: {:?}", other),
        }
        // latest는 기록됨
        assert!(repo.latest(Feed::ForeignNetBuy).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_theme_feed_normalizes_before_compare() {
        let repo = MemorySnapshotRepository::new();
        let raw = vec![json!({"themeCode": " T1 ", "name": "반도체", "rank": 1})];
        let same_after_trim = vec![json!({"themeCode": "T1", "name": "반도체", "rank": 1})];

        persist_if_changed(&repo, Feed::ThemeLeaders, &payload(raw, "10:00")).await;
        let outcome =
            persist_if_changed(&repo, Feed::ThemeLeaders, &payload(same_after_trim, "10:00"))
                .await;

        assert!(matches!(outcome, PersistOutcome::Skipped));
    }
}
