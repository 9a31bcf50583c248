//! Environment variable readers shared by the config sections.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// `None` when unset or empty.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// `1`, `true`, `yes` and `on` are true, anything else set is false.
pub fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Comma separated list, e.g. captured header names or the disabled
/// instrumentation list. Items are trimmed, empty items dropped.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env_opt(key).map(|v| split_list(&v))
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Duration such as `500ms`, `30s`, `2m` or `1h`; a bare number is seconds.
/// `off` and `0` yield `None`.
pub fn env_duration(key: &str, default: &str) -> Result<Option<Duration>, ConfigError> {
    let value = env_or(key, default);
    parse_duration(&value).ok_or_else(|| ConfigError::Parse {
        key: key.into(),
        value,
        error: "expected a duration like 500ms, 30s, 2m or 1h".into(),
    })
}

fn parse_duration(s: &str) -> Option<Option<Duration>> {
    let s = s.trim().to_ascii_lowercase();
    if s.is_empty() || s == "off" || s == "0" {
        return Some(None);
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits.parse().ok()?;

    let duration = match unit {
        "ms" => Duration::from_millis(n),
        "" | "s" => Duration::from_secs(n),
        "m" => Duration::from_secs(n.checked_mul(60)?),
        "h" => Duration::from_secs(n.checked_mul(3600)?),
        _ => return None,
    };
    Some(Some(duration))
}
