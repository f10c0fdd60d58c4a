use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Get the last day of a given month. `None` when the year/month pair is out
/// of chrono's range or the month is not 1-12.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(first_of_next - Duration::days(1))
}

/// Parse a record date stored either as `YYYY-MM-DD` or as a timestamp
/// (`YYYY-MM-DD HH:MM:SS`, optionally with fractional seconds or a `T`
/// separator). Returns `None` for anything else.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Whole days elapsed from `from` to `to` (negative if `from` is later).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Format a date as the `YYYY-MM-DD` key used in SQL range filters.
pub fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
