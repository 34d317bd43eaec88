//! 히스토리 컬렉션의 날짜별 그룹핑.
//!
//! 대시보드 표시 전용의 읽기 측 집계입니다. 쓰기 경로의 변경 감지는
//! 항상 live "latest" 문서와의 서명 비교를 사용하며, 여기서 계산한
//! 버킷은 절대 참조하지 않습니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use serde::Serialize;

use crate::domain::{item_identity, SnapshotDocument};
use crate::signature::item_comparison_signature;
use crate::timestamp::{parse_flexible, TimestampValue};

/// 날짜를 해석할 수 없는 문서가 모이는 버킷 키.
pub const UNKNOWN_DATE_KEY: &str = "날짜 미상";

/// 그룹핑된 히스토리 문서 한 건.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedSnapshot {
    /// 원본 문서
    #[serde(flatten)]
    pub snapshot: SnapshotDocument,
    /// 버킷 내 정렬용 epoch 밀리초 (해석 불가면 0)
    pub comparable_time: i64,
    /// 대표 표시 문자열 (asOf, 없으면 수집 시각)
    pub primary_display: String,
    /// 수집 시각 표시 문자열
    pub collected_display: String,
}

/// 버킷 요약 통계.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    /// 버킷의 가장 이른 문서 표시 문자열
    pub first_time: String,
    /// 버킷의 가장 늦은 문서 표시 문자열
    pub last_time: String,
    /// 첫 문서 대비 마지막 문서에서 변경된 아이템 수
    pub changed_count: usize,
}

/// 하루 단위 버킷.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateBucket {
    /// "YYYY-MM-DD" 또는 [`UNKNOWN_DATE_KEY`]
    pub date_key: String,
    /// "YYYY년 MM월 DD일" 표시 문자열
    pub display_date: String,
    /// 요약 통계
    pub summary: BucketSummary,
    /// 시간 오름차순으로 정렬된 문서 목록
    pub snapshots: Vec<GroupedSnapshot>,
}

/// 히스토리 문서들을 서울 기준 달력 날짜로 버킷팅.
///
/// 버킷은 최신 날짜가 먼저 오며, 날짜 미상 버킷은 항상 마지막입니다.
/// 버킷 내부 문서는 시간 오름차순입니다.
pub fn group_snapshots_by_date(snapshots: &[SnapshotDocument]) -> Vec<DateBucket> {
    let mut groups: BTreeMap<String, Vec<GroupedSnapshot>> = BTreeMap::new();

    for snapshot in snapshots {
        let as_of_date = parse_flexible(&snapshot.as_of);
        let collected_date = snapshot.collected_at;
        let primary_date = as_of_date.or(collected_date);

        let date_key = primary_date
            .map(local_date_key)
            .or_else(|| collected_date.map(local_date_key))
            .unwrap_or_else(|| UNKNOWN_DATE_KEY.to_string());

        let comparable_time = primary_date
            .map(|d| d.timestamp_millis())
            .or_else(|| collected_date.map(|d| d.timestamp_millis()))
            .unwrap_or(0);

        let collected_display = collected_date
            .map(|d| TimestampValue::DateTime(d).display())
            .unwrap_or_else(|| "-".to_string());
        let primary_display = if !snapshot.as_of.is_empty() {
            snapshot.as_of.clone()
        } else {
            collected_display.clone()
        };

        groups.entry(date_key).or_default().push(GroupedSnapshot {
            snapshot: snapshot.clone(),
            comparable_time,
            primary_display,
            collected_display,
        });
    }

    let mut buckets: Vec<DateBucket> = groups
        .into_iter()
        .map(|(date_key, mut grouped)| {
            grouped.sort_by_key(|g| g.comparable_time);

            let summary = match (grouped.first(), grouped.last()) {
                (Some(first), Some(last)) => BucketSummary {
                    first_time: first.primary_display.clone(),
                    last_time: last.primary_display.clone(),
                    changed_count: count_changed_items(
                        &first.snapshot.items,
                        &last.snapshot.items,
                    ),
                },
                _ => BucketSummary {
                    first_time: "-".to_string(),
                    last_time: "-".to_string(),
                    changed_count: 0,
                },
            };

            DateBucket {
                display_date: format_date_heading(&date_key),
                date_key,
                summary,
                snapshots: grouped,
            }
        })
        .collect();

    buckets.sort_by_key(|b| std::cmp::Reverse(date_sort_value(&b.date_key)));
    buckets
}

/// 첫 문서 대비 마지막 문서의 변경 아이템 수.
///
/// 동일성 키(code, 없으면 rank-name)로 매칭하며, 첫 문서에 짝이 없거나
/// 비교용 서명이 다른 아이템을 변경으로 셉니다. 식별 불가 아이템은
/// 항상 변경으로 셉니다.
pub fn count_changed_items(
    first_items: &[serde_json::Value],
    last_items: &[serde_json::Value],
) -> usize {
    let mut first_map = std::collections::HashMap::new();
    for item in first_items {
        if let Some(key) = item_identity(item) {
            first_map.insert(key, item_comparison_signature(item));
        }
    }

    let mut changes = 0;
    for item in last_items {
        let signature = item_comparison_signature(item);
        match item_identity(item) {
            None => changes += 1,
            Some(key) => match first_map.get(&key) {
                Some(previous) if *previous == signature => {}
                _ => changes += 1,
            },
        }
    }

    changes
}

/// UTC 시각의 서울 기준 달력 날짜 키.
fn local_date_key(dt: DateTime<Utc>) -> String {
    let local = dt.with_timezone(&Seoul);
    format!("{:04}-{:02}-{:02}", local.year(), local.month(), local.day())
}

/// 날짜 키를 "YYYY년 MM월 DD일" 머리글로 변환.
fn format_date_heading(date_key: &str) -> String {
    if date_key == UNKNOWN_DATE_KEY {
        return UNKNOWN_DATE_KEY.to_string();
    }

    let parts: Vec<&str> = date_key.split('-').collect();
    match parts.as_slice() {
        [year, month, day] => format!("{}년 {}월 {}일", year, month, day),
        _ => date_key.to_string(),
    }
}

/// 버킷 정렬 값 (미상 버킷은 항상 마지막).
fn date_sort_value(date_key: &str) -> i64 {
    NaiveDate::parse_from_str(date_key, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Seoul.from_local_datetime(&naive).single())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(i64::MIN)
}
