//! 피드/스냅샷 도메인 타입.
//!
//! 피드마다 업스트림 스키마가 달라 아이템은 `serde_json::Value` 객체를
//! 그대로 보존합니다. 필드 이름을 해석하는 쪽은 정규화 함수들입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::theme::normalize_theme_leaders_items;
use crate::timestamp::deserialize_flexible_instant;

/// 스냅샷 아이템 한 건 (임의 필드의 JSON 객체).
pub type SnapshotItem = Map<String, Value>;

/// 시장 데이터 피드 종류.
///
/// 피드마다 "latest" 단일 문서와 append-only 히스토리 컬렉션 쌍을 가집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feed {
    /// 외국인 순매수 상위
    ForeignNetBuy,
    /// 기관 순매수 상위
    InstitutionNetBuy,
    /// 인기 검색 종목
    PopularStocks,
    /// 테마 주도주
    ThemeLeaders,
}

/// 피드별 아이템 정규화 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// 필드 재배치 없이 복제만 수행 (순매수/인기 종목)
    Generic,
    /// 테마 주도주 전용 정규화 (id/rank/leaders 기본값 부여)
    ThemeLeaders,
}

impl Feed {
    /// 전체 피드 목록 (수집기 순회용).
    pub const ALL: [Feed; 4] = [
        Feed::ForeignNetBuy,
        Feed::InstitutionNetBuy,
        Feed::PopularStocks,
        Feed::ThemeLeaders,
    ];

    /// URL 경로용 슬러그.
    pub fn slug(&self) -> &'static str {
        match self {
            Feed::ForeignNetBuy => "foreign-net-buy",
            Feed::InstitutionNetBuy => "institution-net-buy",
            Feed::PopularStocks => "popular-stocks",
            Feed::ThemeLeaders => "theme-leaders",
        }
    }

    /// "latest" 문서가 속한 컬렉션 이름.
    pub fn collection(&self) -> &'static str {
        match self {
            Feed::ForeignNetBuy => "foreignNetBuy",
            Feed::InstitutionNetBuy => "institutionNetBuy",
            Feed::PopularStocks => "popularStocks",
            Feed::ThemeLeaders => "themeLeaders",
        }
    }

    /// append-only 히스토리 컬렉션 이름.
    pub fn history_collection(&self) -> &'static str {
        match self {
            Feed::ForeignNetBuy => "foreignNetBuySnapshots",
            Feed::InstitutionNetBuy => "institutionNetBuySnapshots",
            Feed::PopularStocks => "popularStocksSnapshots",
            Feed::ThemeLeaders => "themeLeadersSnapshots",
        }
    }

    /// 슬러그로부터 피드 해석.
    pub fn from_slug(slug: &str) -> Option<Feed> {
        Feed::ALL.iter().copied().find(|f| f.slug() == slug)
    }

    /// 정규화 방식.
    pub fn kind(&self) -> FeedKind {
        match self {
            Feed::ThemeLeaders => FeedKind::ThemeLeaders,
            _ => FeedKind::Generic,
        }
    }

    /// 서명 계산에 사용할 asOf 라벨 선택.
    ///
    /// 테마 피드는 표시 라벨(asOfLabel)을 우선하고,
    /// 나머지 피드는 제공자 라벨(asOf)을 우선합니다.
    pub fn signature_label(&self, as_of: &str, as_of_label: &str) -> String {
        let (primary, secondary) = match self.kind() {
            FeedKind::ThemeLeaders => (as_of_label, as_of),
            FeedKind::Generic => (as_of, as_of_label),
        };
        if !primary.is_empty() {
            primary.to_string()
        } else {
            secondary.to_string()
        }
    }
}

impl FeedKind {
    /// 피드 종류에 맞는 아이템 정규화.
    pub fn normalize(&self, items: &[Value]) -> Vec<Value> {
        match self {
            FeedKind::Generic => clone_items(items),
            FeedKind::ThemeLeaders => normalize_theme_leaders_items(items),
        }
    }
}

/// 피드 엔드포인트의 응답 형태.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPayload {
    /// 아이템 목록 (없으면 빈 배열)
    #[serde(default)]
    pub items: Vec<Value>,
    /// 제공자가 보고한 기준 시각 라벨 (숫자 등 비문자열은 문자열화)
    #[serde(default, deserialize_with = "lenient_label")]
    pub as_of: Option<String>,
    /// 표시용 라벨 (없으면 asOf로 대체)
    #[serde(default, deserialize_with = "lenient_label")]
    pub as_of_label: Option<String>,
}

/// 라벨 필드의 관대한 역직렬화 (문자열/숫자/불리언 허용, 그 외 None).
fn lenient_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }))
}

impl FeedPayload {
    /// asOf 문자열 (없으면 빈 문자열).
    pub fn as_of_value(&self) -> &str {
        self.as_of.as_deref().unwrap_or("")
    }

    /// 표시 라벨 (asOfLabel → asOf 순 폴백).
    pub fn display_label(&self) -> &str {
        self.as_of_label
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.as_of_value())
    }
}

/// 저장된 스냅샷 문서 ("latest" 또는 히스토리 항목).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    /// 제공자가 보고한 기준 시각 라벨
    #[serde(default)]
    pub as_of: String,
    /// 표시용 라벨
    #[serde(default)]
    pub as_of_label: String,
    /// 아이템 목록
    #[serde(default)]
    pub items: Vec<Value>,
    /// 수집(저장) 시각. latest 문서는 updatedAt, 히스토리는 collectedAt.
    /// 읽기는 덕 타이핑(RFC3339/epoch 밀리초/`{seconds}` 객체)을 허용하고,
    /// 쓰기는 항상 RFC3339입니다.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_flexible_instant"
    )]
    pub collected_at: Option<DateTime<Utc>>,
}

/// 아이템의 안정 식별자.
///
/// `code`가 있으면 그것이 스냅샷 간 동일성 키입니다.
/// 없으면 `rank-name` 조합으로 최선 노력 식별하며,
/// 둘 다 비어 있으면 식별 불가(None)입니다.
pub fn item_identity(item: &Value) -> Option<String> {
    let obj = item.as_object()?;

    if let Some(code) = obj.get("code") {
        let code = scalar_text(code);
        if !code.is_empty() {
            return Some(code);
        }
    }

    let rank = obj.get("rank").map(scalar_text).unwrap_or_default();
    let name = obj.get("name").map(scalar_text).unwrap_or_default();

    if rank.is_empty() && name.is_empty() {
        return None;
    }

    Some(format!("{}-{}", rank, name))
}

/// 업스트림 페이로드와의 앨리어싱을 피하기 위한 얕은 복제.
///
/// 필드 재배치는 하지 않습니다. 객체가 아닌 항목은 그대로 통과합니다.
pub fn clone_items(items: &[Value]) -> Vec<Value> {
    items.to_vec()
}

/// 스칼라 값을 식별자용 문자열로 변환 (null → 빈 문자열).
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => String::new(),
    }
}
