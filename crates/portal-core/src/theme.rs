//! 테마 주도주 피드 전용 정규화.
//!
//! 업스트림 문서에 rank/leaders가 비어 있어도 화면과 서명 계산이
//! 항상 일관된 형태를 받도록 기본값을 채웁니다.

use serde_json::{Map, Value};

/// 테마 주도주 아이템 목록 정규화.
///
/// 각 아이템에 대해:
/// - `themeCode`는 공백 제거 후 보존 (없으면 빈 문자열)
/// - `id`는 themeCode, 없으면 `{name}-{index}` 합성
/// - `leaders`는 항상 배열 (없으면 빈 배열)
/// - `rank`는 항상 유한한 숫자 (없거나 파싱 불가면 index + 1)
pub fn normalize_theme_leaders_items(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_theme_item(item, index))
        .collect()
}

fn normalize_theme_item(item: &Value, index: usize) -> Value {
    let mut safe: Map<String, Value> = item.as_object().cloned().unwrap_or_default();

    let normalized_code = safe
        .get("themeCode")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    let normalized_name = safe
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    let theme_name = if normalized_name.is_empty() {
        "theme".to_string()
    } else {
        normalized_name
    };

    let theme_code = if !normalized_code.is_empty() {
        normalized_code.clone()
    } else {
        safe.get("themeCode")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    safe.insert("themeCode".to_string(), Value::String(theme_code));

    let id = if !normalized_code.is_empty() {
        normalized_code
    } else {
        format!("{}-{}", theme_name, index)
    };
    safe.insert("id".to_string(), Value::String(id));

    if !safe.get("leaders").map(Value::is_array).unwrap_or(false) {
        safe.insert("leaders".to_string(), Value::Array(Vec::new()));
    }

    if !has_finite_rank(safe.get("rank")) {
        safe.insert("rank".to_string(), Value::from(index as u64 + 1));
    }

    Value::Object(safe)
}

/// rank가 유한한 숫자로 해석되는지 확인.
fn has_finite_rank(rank: Option<&Value>) -> bool {
    match rank {
        Some(Value::Number(n)) => n.as_f64().map(f64::is_finite).unwrap_or(false),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
        _ => false,
    }
}
