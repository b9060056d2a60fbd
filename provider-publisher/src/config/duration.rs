//! Compact duration strings such as `90s`, `1m30s` or `250ms`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Whole-string grammar: one or more `<digits><unit>` segments.
fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:[0-9]+(?:ms|s|m|h))+$").unwrap())
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([0-9]+)(ms|s|m|h)").unwrap())
}

/// Parse a compact duration.
///
/// Units are `ms`, `s`, `m` and `h`; segments add up, so `1h30m` is
/// ninety minutes. Zero durations are rejected.
///
/// # Errors
///
/// Returns a human-readable reason on bad syntax, zero, or overflow.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    if !duration_pattern().is_match(input) {
        return Err("expected <number><unit> segments with unit ms, s, m or h".to_string());
    }

    let mut total = Duration::ZERO;
    for captures in segment_pattern().captures_iter(input) {
        let amount: u64 = captures[1]
            .parse()
            .map_err(|_| format!("number {:?} is too large", &captures[1]))?;
        let segment = match &captures[2] {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            _ => amount.checked_mul(3600).map(Duration::from_secs),
        };
        total = segment
            .and_then(|s| total.checked_add(s))
            .ok_or_else(|| "duration is too large".to_string())?;
    }

    if total.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(total)
}
