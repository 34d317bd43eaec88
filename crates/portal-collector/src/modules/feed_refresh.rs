//! 피드 수집 모듈.
//!
//! 업스트림에서 피드별 스냅샷을 가져와 변경된 경우에만 저장합니다.
//! 개별 피드 실패는 기록만 하고 다음 피드로 진행합니다.

use tracing::{error, info, warn};

use portal_core::domain::Feed;
use portal_store::{persist_if_changed, PersistOutcome, SnapshotRepository};
use portal_provider::FeedClient;

use crate::config::CollectorConfig;
use crate::stats::RefreshStats;

/// 쉼표 구분 slug 목록 파싱 (None이면 전체 피드).
///
/// 알 수 없는 slug는 경고 후 무시합니다.
pub fn parse_feed_filter(filter: Option<&str>) -> Vec<Feed> {
    let Some(filter) = filter else {
        return Feed::ALL.to_vec();
    };

    let feeds: Vec<Feed> = filter
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|slug| {
            let feed = Feed::from_slug(slug);
            if feed.is_none() {
                warn!(slug, "알 수 없는 피드 slug, 무시");
            }
            feed
        })
        .collect();

    if feeds.is_empty() {
        Feed::ALL.to_vec()
    } else {
        feeds
    }
}

/// 지정된 피드들을 순차 수집.
pub async fn refresh_feeds(
    repository: &dyn SnapshotRepository,
    client: &FeedClient,
    config: &CollectorConfig,
    feeds: &[Feed],
) -> RefreshStats {
    let mut stats = RefreshStats::default();

    for (i, feed) in feeds.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(config.request_delay()).await;
        }

        stats.attempted += 1;

        let payload = match client.fetch(*feed).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(feed = feed.slug(), error = %e, "피드 수집 실패");
                stats.failed += 1;
                continue;
            }
        };

        match persist_if_changed(repository, *feed, &payload).await {
            PersistOutcome::Stored => {
                info!(feed = feed.slug(), items = payload.items.len(), "새 스냅샷 저장");
                stats.stored += 1;
            }
            PersistOutcome::Skipped => {
                stats.skipped += 1;
            }
            PersistOutcome::Failed { message, .. } => {
                error!(feed = feed.slug(), message = %message, "스냅샷 저장 실패");
                stats.failed += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter_returns_all_feeds() {
        assert_eq!(parse_feed_filter(None).len(), Feed::ALL.len());
    }

    #[test]
    fn test_filter_selects_named_feeds() {
        let feeds = parse_feed_filter(Some("popular-stocks, theme-leaders"));
        assert_eq!(feeds, vec![Feed::PopularStocks, Feed::ThemeLeaders]);
    }

    #[test]
    fn test_unknown_slugs_fall_back_to_all() {
        let feeds = parse_feed_filter(Some("nope,also-nope"));
        assert_eq!(feeds.len(), Feed::ALL.len());
    }
}
