use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Month-first before day-first, so `03/04/2021` is March 4th.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// `March 2021`, `Mar 2021`; parsed with a synthetic day 1.
const MONTH_YEAR_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y"];

/// Years below this come from a 1-3 digit match and are not real dates.
const MIN_YEAR: i32 = 1000;

fn plausible(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    (dt.year() >= MIN_YEAR).then_some(dt)
}

fn midnight(d: NaiveDate) -> Option<NaiveDateTime> {
    d.and_hms_opt(0, 0, 0).and_then(plausible)
}

/// Parse free text as a date or timestamp.
///
/// Accepts RFC 3339, ISO-ish and slash-separated timestamps, written-out
/// dates, month names with a year, compact `YYYYMMDD`, `YYYY-MM` / `YYYY/MM`
/// months and a bare `YYYY` year. Missing day and month default to 1.
/// Offsets are dropped; the wall-clock time is kept.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_matches('"');
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_digits(s);
    }

    if let Some(dt) = DateTime::parse_from_rfc3339(s)
        .ok()
        .and_then(|dt| plausible(dt.naive_local()))
    {
        return Some(dt);
    }
    for fmt in DATETIME_FORMATS {
        if let Some(dt) = NaiveDateTime::parse_from_str(s, fmt).ok().and_then(plausible) {
            return Some(dt);
        }
    }
    let with_day = format!("1 {}", s);
    for fmt in MONTH_YEAR_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(&with_day, fmt).ok().and_then(midnight) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(s, fmt).ok().and_then(midnight) {
            return Some(dt);
        }
    }
    parse_year_month(s)
}

/// All-digit text: `YYYY` (January 1st) or `YYYYMMDD`.
fn parse_digits(s: &str) -> Option<NaiveDateTime> {
    match s.len() {
        4 => NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1).and_then(midnight),
        8 => NaiveDate::parse_from_str(s, "%Y%m%d").ok().and_then(midnight),
        _ => None,
    }
}

/// `YYYY-MM` or `YYYY/MM` → first day of that month.
fn parse_year_month(s: &str) -> Option<NaiveDateTime> {
    if !s.is_ascii() || s.len() != 7 || !matches!(s.as_bytes()[4], b'-' | b'/') {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[5..7].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).and_then(midnight)
}

/// Calendar year and month of a timestamp.
pub fn year_month(dt: &NaiveDateTime) -> (i32, u32) {
    (dt.year(), dt.month())
}
