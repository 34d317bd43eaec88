//! OHLC 차트 레코드 정규화.
//!
//! 증권사/포털 API마다 같은 값을 다른 필드 이름으로 내려줍니다
//! (예: 종가 = cur_prc / stck_clpr / close / clpr ...).
//! 논리 필드별로 우선순위가 있는 앨리어스 목록을 두고 첫 매치를
//! 사용합니다. 목록이 상수라 필드 단위로 독립적으로 테스트됩니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// 종가 앨리어스 (우선순위 순).
const CLOSE_ALIASES: &[&str] = &["cur_prc", "stck_clpr", "close", "closePrice", "clpr", "prpr"];
/// 시가 앨리어스.
const OPEN_ALIASES: &[&str] = &["open_pric", "stck_oprc", "open", "openPrice", "oprc", "opnprc"];
/// 고가 앨리어스.
const HIGH_ALIASES: &[&str] = &["high_pric", "stck_hgpr", "high", "highPrice", "hgpr", "hipr"];
/// 저가 앨리어스.
const LOW_ALIASES: &[&str] = &["low_pric", "stck_lwpr", "low", "lowPrice", "lwpr", "lopr"];
/// 거래량 앨리어스.
const VOLUME_ALIASES: &[&str] = &[
    "trde_qty",
    "acml_vol",
    "volume",
    "trqu",
    "tot_vol",
    "acml_tr_pbmn",
    "totalVolume",
];
/// 날짜 앨리어스.
const DATE_ALIASES: &[&str] = &[
    "stck_bsop_date",
    "stck_bsop_dt",
    "biz_dt",
    "bsop_date",
    "trd_dd",
    "date",
    "dt",
];
/// 시각 앨리어스.
const TIME_ALIASES: &[&str] = &["stck_bsop_time", "stck_trd_time", "time"];

/// 정규화된 캔들 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    /// "YYYY-MM-DD" 또는 "YYYY-MM-DD HH:MM:SS" (제로 패딩이라 문자열 정렬 가능)
    pub date: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// 업스트림 레코드 목록을 캔들 목록으로 정규화.
///
/// 종가도 날짜도 해석할 수 없는 레코드는 조용히 버립니다 (데이터
/// 품질 필터이지 에러가 아닙니다). 결측 시가/고가/저가는 종가 기준으로
/// 대체하여 하류 차트가 항상 완전한 OHLC를 받습니다.
/// 결과는 날짜 라벨 오름차순입니다.
pub fn sanitize_chart_rows(items: &[Value]) -> Vec<ChartRow> {
    let mut rows: Vec<ChartRow> = items.iter().filter_map(sanitize_one).collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date));
    rows
}

fn sanitize_one(item: &Value) -> Option<ChartRow> {
    let close = first_numeric(item, CLOSE_ALIASES)?;
    let date = normalize_date_label(item)?;

    let open = first_numeric(item, OPEN_ALIASES).unwrap_or(close);
    let high = first_numeric(item, HIGH_ALIASES).unwrap_or_else(|| open.max(close));
    let low = first_numeric(item, LOW_ALIASES).unwrap_or_else(|| open.min(close));
    let volume = first_numeric(item, VOLUME_ALIASES).unwrap_or(Decimal::ZERO);

    Some(ChartRow {
        date,
        open,
        high,
        low,
        close,
        volume,
    })
}

/// 날짜/시각 앨리어스에서 표시 라벨 조립.
///
/// 날짜 숫자 8자리 이상 → "YYYY-MM-DD", 시각 숫자 4자리 이상이면
/// " HH:MM:SS"를 덧붙입니다 (초 미제공 시 "00").
/// 날짜가 없고 시각만 있으면 "HH:MM:SS"만 반환합니다.
pub fn normalize_date_label(item: &Value) -> Option<String> {
    for alias in DATE_ALIASES {
        let digits = field_digits(item, alias);
        if digits.len() >= 8 {
            let base = format!("{}-{}-{}", &digits[0..4], &digits[4..6], &digits[6..8]);

            for time_alias in TIME_ALIASES {
                if let Some(time) = time_label(&field_digits(item, time_alias)) {
                    return Some(format!("{} {}", base, time));
                }
            }

            return Some(base);
        }
    }

    for time_alias in TIME_ALIASES {
        if let Some(time) = time_label(&field_digits(item, time_alias)) {
            return Some(time);
        }
    }

    None
}

/// 시각 숫자열 → "HH:MM:SS" (4자리 미만이면 None).
fn time_label(digits: &str) -> Option<String> {
    if digits.len() < 4 {
        return None;
    }
    let seconds = if digits.len() >= 6 { &digits[4..6] } else { "00" };
    Some(format!("{}:{}:{}", &digits[0..2], &digits[2..4], seconds))
}

/// 앨리어스 필드의 숫자만 추출.
fn field_digits(item: &Value, alias: &str) -> String {
    match item.get(alias) {
        Some(Value::String(s)) => s.chars().filter(|c| c.is_ascii_digit()).collect(),
        Some(Value::Number(n)) => n.to_string().chars().filter(|c| c.is_ascii_digit()).collect(),
        _ => String::new(),
    }
}

/// 앨리어스 목록을 우선순위 순으로 시도하여 첫 숫자 값 반환.
fn first_numeric(item: &Value, aliases: &[&str]) -> Option<Decimal> {
    aliases.iter().find_map(|alias| parse_decimal(item.get(*alias)?))
}

/// 값에서 Decimal 파싱. 부호/소수점 외 문자는 제거합니다.
fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// 날짜를 키로 캔들을 병합 (나중 값 우선).
///
/// 연속 조회에서 중복 수신된 날짜를 덮어쓰고, 결과는 날짜 오름차순입니다.
pub fn merge_chart_rows(existing: Vec<ChartRow>, incoming: Vec<ChartRow>) -> Vec<ChartRow> {
    let mut map: BTreeMap<String, ChartRow> = BTreeMap::new();
    for row in existing.into_iter().chain(incoming) {
        map.insert(row.date.clone(), row);
    }
    map.into_values().collect()
}

/// 종목 코드 정규화.
///
/// 숫자만 추출한 뒤 6자리로 맞춥니다 (부족하면 왼쪽 0 패딩, 넘치면
/// 뒤 6자리). 숫자가 전혀 없으면 None.
pub fn normalize_symbol(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() == 6 {
        return Some(digits);
    }
    let padded = format!("{:0>6}", digits);
    Some(padded[padded.len() - 6..].to_string())
}

/// timeframe/period 파라미터를 기간 코드로 해석 (모르면 일봉).
pub fn resolve_period_code(value: &str) -> &'static str {
    match value.trim().to_lowercase().as_str() {
        "day" | "daily" | "d" => "D",
        "week" | "weekly" | "w" => "W",
        "month" | "monthly" | "m" => "M",
        "year" | "yearly" | "y" => "Y",
        _ => "D",
    }
}

/// count 파라미터를 [20, 500] 범위로 제한 (파싱 불가면 120).
pub fn clamp_count(value: Option<&str>) -> u32 {
    let parsed = value
        .map(str::trim)
        .and_then(|s| {
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(120);
    parsed.clamp(20, 500)
}
