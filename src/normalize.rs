//! Pure normalization layer: relative date strings to absolute UTC
//! timestamps, and relative URLs to absolute ones.
//!
//! All functions take the clock as an argument so callers (and tests)
//! control "now".

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use regex::Regex;

/// Result of normalizing a posted-date string.
///
/// `estimated` is true when the string matched no known pattern and the
/// timestamp is the fallback "now" — an auditable marker, not a silent
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedDate {
    pub timestamp: DateTime<Utc>,
    pub estimated: bool,
}

/// Compiled relative-date patterns plus the configured absolute formats.
#[derive(Debug)]
pub struct DateNormalizer {
    hours: Regex,
    days: Regex,
    weeks: Regex,
    formats: Vec<String>,
}

impl DateNormalizer {
    pub fn new(formats: &[String]) -> Self {
        Self {
            // Patterns are matched against trimmed, lowercased input.
            hours: Regex::new(r"^(\d+)\s*(h|hr|hrs|hour|hours)\b").unwrap(),
            days: Regex::new(r"^(\d+)\s*(d|day|days)\b").unwrap(),
            weeks: Regex::new(r"^(\d+)\s*(w|wk|wks|week|weeks)\b").unwrap(),
            formats: formats.to_vec(),
        }
    }

    /// Normalize a feed date string against `now`.
    ///
    /// Precedence: "just now", then hour/day/week offsets, then the
    /// configured absolute formats. Anything else falls back to `now`
    /// with the `estimated` flag set.
    pub fn normalize(&self, raw: &str, now: DateTime<Utc>) -> NormalizedDate {
        let cleaned = raw.trim().to_lowercase();

        if cleaned.contains("just now") {
            return exact(now);
        }
        if let Some(n) = capture_count(&self.hours, &cleaned) {
            return exact(now - chrono::Duration::hours(n));
        }
        if let Some(n) = capture_count(&self.days, &cleaned) {
            return exact(now - chrono::Duration::days(n));
        }
        if let Some(n) = capture_count(&self.weeks, &cleaned) {
            return exact(now - chrono::Duration::weeks(n));
        }
        for fmt in &self.formats {
            if let Some(ts) = parse_absolute(&cleaned, fmt, now) {
                return exact(ts);
            }
        }

        NormalizedDate {
            timestamp: now,
            estimated: true,
        }
    }
}

fn exact(timestamp: DateTime<Utc>) -> NormalizedDate {
    NormalizedDate {
        timestamp,
        estimated: false,
    }
}

fn capture_count(re: &Regex, input: &str) -> Option<i64> {
    re.captures(input)?.get(1)?.as_str().parse().ok()
}

/// Parse an absolute calendar string at UTC midnight.
///
/// Year-less formats assume the current year; a result in the future rolls
/// back one year (a "Mar 15" seen in January was last March).
fn parse_absolute(input: &str, fmt: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = if fmt.contains("%Y") {
        chrono::NaiveDate::parse_from_str(input, fmt).ok()?
    } else {
        let with_year = format!("{input} {}", now.year());
        let fmt_with_year = format!("{fmt} %Y");
        let candidate = chrono::NaiveDate::parse_from_str(&with_year, &fmt_with_year).ok()?;
        if candidate > now.date_naive() {
            candidate.with_year(now.year() - 1)?
        } else {
            candidate
        }
    };
    let midnight = date.and_time(NaiveTime::MIN);
    Some(Utc.from_utc_datetime(&midnight))
}

/// Resolve a possibly-relative URL against a base.
///
/// Absolute http(s) URLs pass through untouched; anything else is joined
/// onto `base`. Returns None when no absolute URL can be produced.
pub fn resolve_url(raw: &str, base: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(u) = url::Url::parse(trimmed) {
        if u.scheme() == "http" || u.scheme() == "https" {
            return Some(u.to_string());
        }
        return None;
    }
    let base = url::Url::parse(base).ok()?;
    base.join(trimmed).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn normalizer() -> DateNormalizer {
        let formats: Vec<String> = ["%b %d, %Y", "%B %d, %Y", "%b %d", "%B %d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        DateNormalizer::new(&formats)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_just_now() {
        let d = normalizer().normalize("Just now", fixed_now());
        assert_eq!(d.timestamp, fixed_now());
        assert!(!d.estimated);
    }

    #[test]
    fn test_hours_ago() {
        let d = normalizer().normalize("2h ago", fixed_now());
        assert_eq!(d.timestamp, fixed_now() - chrono::Duration::hours(2));
        assert!(!d.estimated);
    }

    #[test]
    fn test_days_ago() {
        let d = normalizer().normalize("3d ago", fixed_now());
        assert_eq!(d.timestamp, fixed_now() - chrono::Duration::days(3));
        assert!(!d.estimated);
    }

    #[test]
    fn test_weeks_ago() {
        let d = normalizer().normalize("1w ago", fixed_now());
        assert_eq!(d.timestamp, fixed_now() - chrono::Duration::weeks(1));
        assert!(!d.estimated);
    }

    #[test]
    fn test_verbose_units() {
        let n = normalizer();
        assert_eq!(
            n.normalize("5 hours ago", fixed_now()).timestamp,
            fixed_now() - chrono::Duration::hours(5)
        );
        assert_eq!(
            n.normalize("2 weeks", fixed_now()).timestamp,
            fixed_now() - chrono::Duration::weeks(2)
        );
    }

    #[test]
    fn test_absolute_with_year() {
        let d = normalizer().normalize("Mar 15, 2026", fixed_now());
        assert_eq!(
            d.timestamp,
            Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
        );
        assert!(!d.estimated);
    }

    #[test]
    fn test_yearless_future_rolls_back() {
        // "Dec 25" observed in August was last December.
        let d = normalizer().normalize("Dec 25", fixed_now());
        assert_eq!(
            d.timestamp,
            Utc.with_ymd_and_hms(2025, 12, 25, 0, 0, 0).unwrap()
        );
        assert!(!d.estimated);
    }

    #[test]
    fn test_unrecognized_falls_back_flagged() {
        let d = normalizer().normalize("yesterday-ish", fixed_now());
        assert_eq!(d.timestamp, fixed_now());
        assert!(d.estimated);
    }

    #[test]
    fn test_empty_falls_back_flagged() {
        let d = normalizer().normalize("", fixed_now());
        assert!(d.estimated);
    }

    #[test]
    fn test_resolve_relative_url() {
        assert_eq!(
            resolve_url("/in/jane", "https://feed.example").as_deref(),
            Some("https://feed.example/in/jane")
        );
    }

    #[test]
    fn test_resolve_absolute_url_passthrough() {
        assert_eq!(
            resolve_url("https://feed.example/posts/1", "https://other.example").as_deref(),
            Some("https://feed.example/posts/1")
        );
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        assert!(resolve_url("javascript:void(0)", "https://feed.example").is_none());
        assert!(resolve_url("", "https://feed.example").is_none());
    }
}
