//! 스냅샷 비교 키(서명) 생성.
//!
//! 업스트림 API가 아이템 순서나 JSON 키 순서를 바꿔 내려줘도
//! 논리적으로 같은 내용이면 바이트 단위로 동일한 서명이 나와야 합니다.
//! 이 성질이 파이프라인 전체의 멱등성을 지탱합니다.
//!
//! 정렬 규칙:
//! 1. 아이템은 숫자 rank 오름차순 (파싱 불가 rank는 +∞로 취급하여 맨 뒤)
//! 2. rank 동률은 이름의 코드포인트 순 (한글 음절 구간에서는 가나다순과 일치)
//! 3. 각 아이템의 키는 재귀적으로 알파벳순 직렬화

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// 아이템 하나를 비교용 형태로 정규화.
///
/// 같은 키/값 쌍을 가지되 키가 알파벳순으로 정렬된 새 객체를 반환합니다.
/// 객체가 아닌 입력은 빈 객체가 됩니다.
pub fn normalize_item_for_comparison(item: &Value) -> Value {
    match item.as_object() {
        Some(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                // 키 목록은 obj에서 나왔으므로 항상 존재
                if let Some(value) = obj.get(key) {
                    sorted.insert(key.clone(), value.clone());
                }
            }
            Value::Object(sorted)
        }
        None => Value::Object(Map::new()),
    }
}

/// 아이템 목록을 비교용 형태로 정규화.
///
/// rank 오름차순 정렬 후 각 아이템에 [`normalize_item_for_comparison`]을
/// 적용합니다. 배열이 아닌 입력을 방어하는 대신 슬라이스를 받습니다.
pub fn normalize_items_for_comparison(items: &[Value]) -> Vec<Value> {
    let mut sorted: Vec<&Value> = items.iter().collect();
    sorted.sort_by(|a, b| compare_items(a, b));
    sorted.into_iter().map(normalize_item_for_comparison).collect()
}

/// 스냅샷 서명 문자열 생성.
///
/// `{asOf, items}`를 키 정렬이 보장된 canonical JSON으로 직렬화합니다.
/// 순수 함수이며, 아이템 순서/키 순서 차이에 불변입니다.
pub fn build_snapshot_signature(as_of_value: &str, items: &[Value]) -> String {
    let normalized_items = normalize_items_for_comparison(items);

    let mut payload = Map::new();
    payload.insert("asOf".to_string(), Value::String(as_of_value.to_string()));
    payload.insert("items".to_string(), Value::Array(normalized_items));

    let mut out = String::new();
    write_canonical(&Value::Object(payload), &mut out);
    out
}

/// 아이템 한 건의 비교용 서명.
///
/// 히스토리 그룹핑의 변경 아이템 집계가 아이템 단위 비교에 사용합니다.
pub fn item_comparison_signature(item: &Value) -> String {
    let normalized = normalize_item_for_comparison(item);
    let mut out = String::new();
    write_canonical(&normalized, &mut out);
    out
}

/// rank → 이름 순 아이템 비교.
fn compare_items(a: &Value, b: &Value) -> Ordering {
    let rank_a = parse_rank(a.get("rank"));
    let rank_b = parse_rank(b.get("rank"));

    match rank_a.partial_cmp(&rank_b) {
        Some(Ordering::Equal) | None => {}
        Some(ordering) => return ordering,
    }

    let name_a = name_text(a);
    let name_b = name_text(b);
    name_a.cmp(&name_b)
}

/// rank 값을 숫자로 파싱. 실패하면 +∞ (맨 뒤로 정렬).
fn parse_rank(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::INFINITY),
        Some(Value::String(s)) => parse_float_prefix(s).unwrap_or(f64::INFINITY),
        _ => f64::INFINITY,
    }
}

/// 문자열 앞부분의 숫자를 관대하게 파싱 ("3위" → 3.0).
fn parse_float_prefix(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, ch) in trimmed.char_indices() {
        match ch {
            '+' | '-' if i == 0 => end = i + ch.len_utf8(),
            '0'..='9' => {
                seen_digit = true;
                end = i + ch.len_utf8();
            }
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + ch.len_utf8();
            }
            _ => break,
        }
    }

    if !seen_digit {
        return None;
    }
    trimmed[..end].parse().ok()
}

/// 이름 필드를 문자열로 추출 (없으면 빈 문자열).
fn name_text(item: &Value) -> String {
    match item.get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// canonical JSON 직렬화.
///
/// 객체 키를 재귀적으로 정렬하여 출력합니다. 스칼라는 serde_json의
/// compact 표현을 그대로 사용하므로 숫자/문자열 인코딩도 결정적입니다.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(v) = obj.get(*key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        // Null / Bool / Number / String은 Display가 compact JSON
        scalar => out.push_str(&scalar.to_string()),
    }
}
