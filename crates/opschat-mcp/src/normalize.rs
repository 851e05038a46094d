//! Argument normalization applied before every tool invocation
//!
//! Models emit arguments in whatever shape their training favors:
//! snake_case keys, Grafana-style relative time expressions, range
//! queries without a step. Providers are stricter, so arguments are
//! rewritten here rather than rejected there.

use chrono::{Duration, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static RELATIVE_TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^now([+-])(\d+)([smhd])$").expect("Invalid relative time pattern"));

/// Rewrite tool arguments into the shape providers accept.
///
/// Per key, in order:
/// 1. String values of the form `now±<n><unit>` become absolute
///    RFC 3339 UTC timestamps. The key is kept as-is and no further
///    rule applies to it.
/// 2. For the primary provider, keys containing `_` are converted to
///    camelCase.
/// 3. After the loop, tools whose name contains both `prometheus` and
///    `range` get `stepSeconds: 60` injected when absent.
pub fn normalize_arguments(
    tool_name: &str,
    arguments: Map<String, Value>,
    primary: bool,
) -> Map<String, Value> {
    let mut normalized = Map::new();

    for (key, value) in arguments {
        if let Value::String(text) = &value {
            if text.starts_with("now-") || text.starts_with("now+") {
                if let Some(timestamp) = resolve_relative_time(text) {
                    normalized.insert(key, Value::String(timestamp));
                    continue;
                }
            }
        }

        let key = if primary && key.contains('_') {
            to_camel_case(&key)
        } else {
            key
        };
        normalized.insert(key, value);
    }

    if tool_name.contains("prometheus") && tool_name.contains("range") {
        normalized
            .entry("stepSeconds".to_string())
            .or_insert(Value::from(60));
    }

    normalized
}

/// Resolve `now±<n><unit>` against the current time.
///
/// Returns `None` for anything outside the supported grammar, which
/// leaves the original value untouched upstream.
fn resolve_relative_time(expr: &str) -> Option<String> {
    let caps = RELATIVE_TIME_REGEX.captures(expr)?;
    let amount: i64 = caps[2].parse().ok()?;
    let unit_secs: i64 = match &caps[3] {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return None,
    };
    let mut offset = amount.checked_mul(unit_secs)?;
    if &caps[1] == "-" {
        offset = -offset;
    }
    let resolved = Utc::now().checked_add_signed(Duration::try_seconds(offset)?)?;
    Some(resolved.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// `start_time` -> `startTime`. The first segment is kept verbatim,
/// later segments are capitalized, empty segments are dropped.
fn to_camel_case(key: &str) -> String {
    let mut parts = key.split('_');
    let mut result = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}
