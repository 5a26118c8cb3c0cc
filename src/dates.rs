//! Relative and absolute date expressions, expanded into inclusive day ranges.

use chrono::{NaiveDate, TimeDelta};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Invalid date format: '{0}'. Supported formats: 'YYYY-MM-DD', 'N days ago', 'N weeks ago', 'yesterday', 'today'"
)]
pub struct DateParseError(pub String);

/// Resolve one expression against `today`.
pub fn parse(expr: &str, today: NaiveDate) -> Result<NaiveDate, DateParseError> {
    let normalized = expr.trim().to_lowercase();
    let err = || DateParseError(expr.to_string());

    match normalized.as_str() {
        "today" => return Ok(today),
        "yesterday" => return today.checked_sub_signed(TimeDelta::days(1)).ok_or_else(err),
        _ => {}
    }

    if let Some(delta) = parse_relative(&normalized) {
        return today.checked_sub_signed(delta).ok_or_else(err);
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").map_err(|_| err())
}

/// `N day(s) ago` / `N week(s) ago`.
fn parse_relative(s: &str) -> Option<TimeDelta> {
    let mut parts = s.split_whitespace();
    let count = parts.next()?;
    if !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = count.parse().ok()?;
    let unit = parts.next()?;
    if parts.next()? != "ago" || parts.next().is_some() {
        return None;
    }
    match unit {
        "day" | "days" => TimeDelta::try_days(n),
        "week" | "weeks" => TimeDelta::try_weeks(n),
        _ => None,
    }
}

/// Every day between `since` and `until` (default today), inclusive and ascending.
/// Reversed bounds are swapped.
pub fn expand(
    since: &str,
    until: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<NaiveDate>, DateParseError> {
    let start = parse(since, today)?;
    let end = match until {
        Some(u) => parse(u, today)?,
        None => today,
    };
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_expressions() {
        let today = d("2025-06-10");
        assert_eq!(parse("today", today).unwrap(), today);
        assert_eq!(parse("Yesterday", today).unwrap(), d("2025-06-09"));
        assert_eq!(parse("1 day ago", today).unwrap(), d("2025-06-09"));
        assert_eq!(parse("3 days ago", today).unwrap(), d("2025-06-07"));
        assert_eq!(parse("2 weeks ago", today).unwrap(), d("2025-05-27"));
        assert_eq!(parse("0 days ago", today).unwrap(), today);
        assert_eq!(parse(" 2025-01-31 ", today).unwrap(), d("2025-01-31"));
    }

    #[test]
    fn test_parse_rejects_unknown_formats() {
        let today = d("2025-06-10");
        for bad in ["", "last week", "3 months ago", "3 days", "days ago", "2025/06/10", "2025-02-30", "-1 days ago x", "-3 days ago", "+3 days ago", "3.5 days ago"] {
            let err = parse(bad, today).unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("Supported formats"), "{bad}: {msg}");
            assert!(msg.contains("YYYY-MM-DD"));
        }
    }

    #[test]
    fn test_signed_count_never_reaches_future() {
        let today = d("2025-06-10");
        assert!(parse("-3 days ago", today).is_err());
        assert!(parse("+1 week ago", today).is_err());
        assert!(expand("2025-06-01", Some("-3 days ago"), today).is_err());
    }

    #[test]
    fn test_expand_three_days_ago() {
        let today = d("2025-06-10");
        let dates = expand("3 days ago", Some("today"), today).unwrap();
        assert_eq!(
            dates,
            vec![d("2025-06-07"), d("2025-06-08"), d("2025-06-09"), d("2025-06-10")]
        );
    }

    #[test]
    fn test_expand_until_defaults_to_today() {
        let today = d("2025-06-10");
        assert_eq!(
            expand("yesterday", None, today).unwrap(),
            vec![d("2025-06-09"), d("2025-06-10")]
        );
    }

    #[test]
    fn test_expand_is_symmetric_and_contiguous() {
        let today = d("2025-03-02");
        let pairs = [
            ("2025-02-25", "2025-03-01"),
            ("1 week ago", "today"),
            ("2024-12-30", "2025-01-02"),
            ("today", "today"),
        ];
        for (a, b) in pairs {
            let forward = expand(a, Some(b), today).unwrap();
            let backward = expand(b, Some(a), today).unwrap();
            assert_eq!(forward, backward, "{a} / {b}");
            assert!(!forward.is_empty());
            for pair in forward.windows(2) {
                assert_eq!(pair[1] - pair[0], TimeDelta::days(1));
            }
        }
    }

    #[test]
    fn test_expand_crosses_leap_day() {
        let dates = expand("2024-02-28", Some("2024-03-01"), d("2024-06-01")).unwrap();
        assert_eq!(dates, vec![d("2024-02-28"), d("2024-02-29"), d("2024-03-01")]);
    }

    #[test]
    fn test_expand_propagates_parse_error() {
        assert!(expand("soon", None, d("2025-06-10")).is_err());
        assert!(expand("today", Some("later"), d("2025-06-10")).is_err());
    }
}
