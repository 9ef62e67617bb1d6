use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// One `<url>` record of a sitemap, tagged with the document it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
    pub source_file: String,
}

impl SitemapEntry {
    pub fn new(url: String, source_file: String) -> Self {
        Self {
            url,
            last_modified: None,
            priority: None,
            source_file,
        }
    }

    pub fn with_last_modified(mut self, last_modified: Option<DateTime<FixedOffset>>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_priority(mut self, priority: Option<f32>) -> Self {
        self.priority = priority;
        self
    }
}

/// Parse a `<lastmod>` value in any of the W3C datetime forms sitemaps use.
///
/// Full RFC 3339 timestamps keep their offset, minute-precision timestamps
/// are accepted, and a bare `YYYY-MM-DD` date becomes midnight UTC.
pub fn parse_lastmod(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt);
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Parse a `<priority>` value. Values outside `[0, 1]` are rejected.
pub fn parse_priority(raw: &str) -> Option<f32> {
    let value: f32 = raw.trim().parse().ok()?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_lastmod_rfc3339() {
        let dt = parse_lastmod("2024-03-05T10:20:30+02:00").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_parse_lastmod_without_seconds() {
        let dt = parse_lastmod("2024-03-05T10:20+00:00").unwrap();
        assert_eq!(dt.minute(), 20);
    }

    #[test]
    fn test_parse_lastmod_date_only() {
        let dt = parse_lastmod(" 2023-12-31 ").unwrap();
        assert_eq!(dt.day(), 31);
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_lastmod_garbage() {
        assert!(parse_lastmod("yesterday").is_none());
        assert!(parse_lastmod("").is_none());
    }

    #[test]
    fn test_parse_priority_bounds() {
        assert_eq!(parse_priority("0.8"), Some(0.8));
        assert_eq!(parse_priority("1"), Some(1.0));
        assert_eq!(parse_priority("0.0"), Some(0.0));
        assert_eq!(parse_priority("1.5"), None);
        assert_eq!(parse_priority("-0.1"), None);
        assert_eq!(parse_priority("high"), None);
        assert_eq!(parse_priority("NaN"), None);
    }
}
