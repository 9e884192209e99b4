//! Date parsing shared by the statement models and report filters.

use chrono::{DateTime, NaiveDate};

/// `YYYY-MM-DD`, optionally followed by a time component (`T...` or a
/// space), which is ignored.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// `DD/MM/YY` as used by the manual account-transfer journals. Two-digit
/// years are in the 2000s.
pub fn parse_ddmmyy(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('/');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let year: i32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month, day)
}
