//! 덕 타이핑된 타임스탬프 입력의 정규화.
//!
//! 업스트림과 저장소가 시각을 제각각의 형태로 내려줍니다:
//! RFC3339 문자열, "YYYY-MM-DD HH:MM:SS" 네이버식 라벨,
//! "2024년 1월 2일" 한국어 라벨, epoch 초 객체(`{seconds}`), epoch 밀리초 숫자.
//! 호출부마다 런타임 타입 검사를 흩뿌리는 대신 태그된 유니온 하나와
//! 단일 정규화 함수로 수렴시킵니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 입력 가능한 타임스탬프 형태.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampValue {
    /// 이미 파싱된 시각
    DateTime(DateTime<Utc>),
    /// 문자열 라벨 (ISO, 네이버식, 한국어 날짜 등)
    Text(String),
    /// epoch 초 (Firestore Timestamp 내보내기 형태)
    EpochSeconds(i64),
    /// epoch 밀리초 (JS Date.now() 계열)
    EpochMillis(i64),
}

impl TimestampValue {
    /// JSON 값에서 타임스탬프 형태 분류.
    ///
    /// `{seconds: ...}` 객체는 epoch 초, 숫자는 epoch 밀리초로 봅니다.
    pub fn from_json(value: &Value) -> Option<TimestampValue> {
        match value {
            Value::String(s) if !s.is_empty() => Some(TimestampValue::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(TimestampValue::EpochMillis),
            Value::Object(obj) => obj
                .get("seconds")
                .and_then(Value::as_i64)
                .map(TimestampValue::EpochSeconds),
            _ => None,
        }
    }

    /// 정규화된 UTC 시각. 해석 불가능하면 None.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            TimestampValue::DateTime(dt) => Some(*dt),
            TimestampValue::Text(s) => parse_flexible(s),
            TimestampValue::EpochSeconds(secs) => Utc.timestamp_opt(*secs, 0).single(),
            TimestampValue::EpochMillis(ms) => Utc.timestamp_millis_opt(*ms).single(),
        }
    }

    /// 표시용 문자열.
    ///
    /// 문자열 입력은 원문 그대로, 시각 입력은 서울 시간으로 렌더링합니다.
    /// 해석 불가능한 경우 "-"를 반환합니다.
    pub fn display(&self) -> String {
        match self {
            TimestampValue::Text(s) => s.clone(),
            other => match other.to_datetime() {
                Some(dt) => format_seoul(dt),
                None => "-".to_string(),
            },
        }
    }
}

/// 덕 타이핑된 선택적 시각 필드의 serde 역직렬화기.
///
/// RFC3339 등 문자열 외에 epoch 밀리초 숫자와 `{seconds}` 객체
/// (Firestore Timestamp 내보내기 형태)도 허용합니다.
/// 해석 불가능한 값은 오류 대신 None으로 떨어집니다.
pub fn deserialize_flexible_instant<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(TimestampValue::from_json)
        .and_then(|ts| ts.to_datetime()))
}

/// UTC 시각을 서울 시간 "YYYY-MM-DD HH:MM:SS"로 포맷.
pub fn format_seoul(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Seoul).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 관대한 시각 문자열 파싱.
///
/// 1. RFC3339 직접 파싱
/// 2. 네이버식 "YYYY-MM-DD HH:MM(:SS)" / "YYYY-MM-DD" (서울 시간으로 해석)
/// 3. 한국어 조사(년/월/일)와 `.`/`/` 구분자를 대시로 치환 후 재시도
pub fn parse_flexible(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = parse_naive_seoul(trimmed) {
        return Some(dt);
    }

    let normalized = normalize_korean_date(trimmed);
    if normalized != trimmed {
        return parse_naive_seoul(&normalized);
    }

    None
}

/// 구분자 없는 naive 포맷들을 서울 시간으로 해석.
fn parse_naive_seoul(text: &str) -> Option<DateTime<Utc>> {
    const DATETIME_FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return seoul_to_utc(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return seoul_to_utc(date.and_hms_opt(0, 0, 0)?);
    }

    None
}

fn seoul_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Seoul
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 한국어 날짜 표기를 대시 구분 표기로 변환.
///
/// "2024년 1월 2일" → "2024-1-2", "2024.01.02" → "2024-01-02"
fn normalize_korean_date(text: &str) -> String {
    let replaced = text
        .replace(['년', '월'], "-")
        .replace('일', "")
        .replace(['.', '/'], "-");

    // 대시 주변 공백 제거 후 잔여 공백은 시간 구분자로 유지
    let mut collapsed = String::with_capacity(replaced.len());
    let mut chars = replaced.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '-' {
            while collapsed.ends_with(' ') {
                collapsed.pop();
            }
            collapsed.push('-');
            while chars.peek() == Some(&' ') {
                chars.next();
            }
        } else {
            collapsed.push(ch);
        }
    }

    collapsed.trim().trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rfc3339_parses() {
        let dt = parse_flexible("2024-01-02T09:00:00+09:00").expect("파싱 성공");
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_naver_label_parses_as_seoul() {
        // 09:00 KST = 00:00 UTC
        let dt = parse_flexible("2024-01-02 09:00:00").expect("파싱 성공");
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_korean_particles_parse() {
        let dt = parse_flexible("2024년 1월 2일").expect("파싱 성공");
        assert_eq!(
            dt,
            Seoul
                .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_dot_separator_parses() {
        let dt = parse_flexible("2024.01.02").expect("파싱 성공");
        assert_eq!(
            dt,
            Seoul
                .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_garbage_returns_none() {
        assert_eq!(parse_flexible("장중 집계"), None);
        assert_eq!(parse_flexible(""), None);
    }

    #[test]
    fn test_from_json_variants() {
        assert_eq!(
            TimestampValue::from_json(&json!("2024-01-02")),
            Some(TimestampValue::Text("2024-01-02".to_string()))
        );
        assert_eq!(
            TimestampValue::from_json(&json!({"seconds": 1704150000})),
            Some(TimestampValue::EpochSeconds(1704150000))
        );
        assert_eq!(
            TimestampValue::from_json(&json!(1704150000000i64)),
            Some(TimestampValue::EpochMillis(1704150000000))
        );
        assert_eq!(TimestampValue::from_json(&json!(null)), None);
        assert_eq!(TimestampValue::from_json(&json!("")), None);
    }

    #[test]
    fn test_epoch_seconds_roundtrip() {
        let ts = TimestampValue::EpochSeconds(1704153600);
        assert_eq!(
            ts.to_datetime(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_display_text_passthrough() {
        let ts = TimestampValue::Text("1월 2일 장중 기준".to_string());
        assert_eq!(ts.display(), "1월 2일 장중 기준");
    }
}
