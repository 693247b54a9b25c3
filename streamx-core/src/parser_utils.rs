//! Common helpers for decoding loosely typed venue JSON.
//!
//! Venue payloads mix strings and numbers for the same field, so every helper
//! accepts both. Missing or empty values decode to `None`.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Parses a `Decimal` from a string or number value.
///
/// Numbers go through their textual form so `0.1` stays exactly `0.1`.
pub fn value_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) if !s.is_empty() => Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .ok(),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        _ => None,
    }
}

/// Parses `data[key]` as a `Decimal`.
pub fn parse_decimal(data: &Value, key: &str) -> Option<Decimal> {
    data.get(key).and_then(value_decimal)
}

/// Parses `data[key]` as a `Decimal`, defaulting to zero.
pub fn decimal_or_zero(data: &Value, key: &str) -> Decimal {
    parse_decimal(data, key).unwrap_or(Decimal::ZERO)
}

/// Parses a millisecond timestamp or other integer from a string or number.
pub fn value_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parses `data[key]` as an integer timestamp.
pub fn parse_timestamp(data: &Value, key: &str) -> Option<i64> {
    data.get(key).and_then(value_i64)
}

/// Renders a scalar as a string: strings verbatim, numbers and bools in their
/// JSON form, null and missing as empty.
pub fn value_string(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Parses `data[key]` with [`value_string`].
pub fn parse_string(data: &Value, key: &str) -> String {
    value_string(data.get(key))
}

/// Parses a flag that may be a bool or the strings `"true"` / `"1"`.
pub fn parse_bool(data: &Value, key: &str) -> bool {
    match data.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
        _ => false,
    }
}

/// Parses a list of `[price, size]` pairs. Malformed entries are skipped.
pub fn parse_price_levels(v: Option<&Value>) -> Vec<(Decimal, Decimal)> {
    let Some(levels) = v.and_then(Value::as_array) else {
        return Vec::new();
    };
    levels
        .iter()
        .filter_map(|level| {
            let pair = level.as_array()?;
            let price = value_decimal(pair.first()?)?;
            let size = value_decimal(pair.get(1)?)?;
            Some((price, size))
        })
        .collect()
}

/// Current UTC time in milliseconds.
pub fn milliseconds() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    // ==================== Decimal Tests ====================

    #[test]
    fn test_parse_decimal_string_and_number() {
        let data = json!({"p": "50000.5", "v": 0.1, "e": "", "x": "abc"});
        assert_eq!(parse_decimal(&data, "p"), Some(dec!(50000.5)));
        assert_eq!(parse_decimal(&data, "v"), Some(dec!(0.1)));
        assert_eq!(parse_decimal(&data, "e"), None);
        assert_eq!(parse_decimal(&data, "x"), None);
        assert_eq!(decimal_or_zero(&data, "missing"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_price_levels_skips_malformed() {
        let v = json!([["100.5", "2"], ["bad"], ["99", "0"], "x"]);
        let levels = parse_price_levels(Some(&v));
        assert_eq!(levels, vec![(dec!(100.5), dec!(2)), (dec!(99), dec!(0))]);
        assert!(parse_price_levels(None).is_empty());
    }

    // ==================== Scalar Tests ====================

    #[test]
    fn test_parse_timestamp() {
        let data = json!({"a": 1704110400000i64, "b": "1704110400000", "c": "x"});
        assert_eq!(parse_timestamp(&data, "a"), Some(1704110400000));
        assert_eq!(parse_timestamp(&data, "b"), Some(1704110400000));
        assert_eq!(parse_timestamp(&data, "c"), None);
    }

    #[test]
    fn test_parse_string_and_bool() {
        let data = json!({"s": "Buy", "n": 12, "t": "true", "one": "1", "b": true, "z": null});
        assert_eq!(parse_string(&data, "s"), "Buy");
        assert_eq!(parse_string(&data, "n"), "12");
        assert_eq!(parse_string(&data, "z"), "");
        assert!(parse_bool(&data, "t"));
        assert!(parse_bool(&data, "one"));
        assert!(parse_bool(&data, "b"));
        assert!(!parse_bool(&data, "s"));
    }

    #[test]
    fn test_milliseconds_is_recent() {
        assert!(milliseconds() > 1_700_000_000_000);
    }
}
