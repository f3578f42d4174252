use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Parses the longest numeric prefix of `input`, after leading whitespace.
///
/// Mirrors `parseFloat`: `"2.5h"` is 2.5, `"  .5"` is 0.5, `"1e3x"` is 1000,
/// `"Infinity"` is infinite, and anything without a numeric prefix is `None`.
#[must_use]
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("Invalid regex")
    });

    let matched = re.find(input.trim_start())?.as_str();

    match matched.trim_start_matches(['+', '-']) {
        "Infinity" if matched.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => matched.parse().ok(),
    }
}

/// Reads a JSON `hours` value as a number.
///
/// Numbers are taken as-is and strings go through [`parse_float_prefix`].
/// Null, booleans, arrays, objects and NaN read as `None`.
#[must_use]
pub fn read_hours(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    };

    parsed.filter(|h| !h.is_nan())
}

/// Like [`read_hours`], but unreadable values contribute `0.0`.
#[must_use]
pub fn lenient_hours(value: &Value) -> f64 {
    read_hours(value).unwrap_or(0.0)
}

#[must_use]
pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{hours:.0} h")
    } else {
        format!("{hours:.2} h")
    }
}
