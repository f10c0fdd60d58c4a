use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::date_util::last_day_of_month;
use crate::error::{Error, Result};

static RE_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").unwrap());

/// A calendar month that KPIs are measured over, keyed as `YYYY-MM`.
///
/// Construction validates the month and resolves the inclusive date range
/// once, so a `MeasurementPeriod` in hand always has a valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeasurementPeriod {
    year: i32,
    month: u32,
    start: NaiveDate,
    end: NaiveDate,
}

impl MeasurementPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let malformed = || Error::MalformedPeriod(format!("{year:04}-{month:02}"));
        if !(1..=12).contains(&month) {
            return Err(malformed());
        }
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(malformed)?;
        let end = last_day_of_month(year, month).ok_or_else(malformed)?;
        Ok(Self {
            year,
            month,
            start,
            end,
        })
    }

    /// Parse a `YYYY-MM` token. A single-digit month (`2025-3`) is accepted
    /// and normalised to `2025-03`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let caps = RE_MONTH
            .captures(s)
            .ok_or_else(|| Error::MalformedPeriod(s.to_string()))?;
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| Error::MalformedPeriod(s.to_string()))?;
        let month: u32 = caps[2]
            .parse()
            .map_err(|_| Error::MalformedPeriod(s.to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(Error::MalformedPeriod(format!(
                "{s}: month must be between 1 and 12"
            )));
        }
        Self::new(year, month)
    }

    /// The month containing today (local time).
    pub fn current() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }

    /// The month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let end = last_day_of_month(date.year(), date.month()).unwrap_or(date);
        Self {
            year: date.year(),
            month: date.month(),
            start,
            end,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Canonical storage key, e.g. `2025-11`.
    pub fn to_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Inclusive (first day, last day) of the month.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }

    pub fn previous(&self) -> Result<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl FromStr for MeasurementPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for MeasurementPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// Resolve a `YYYY-MM` token to its inclusive (start, end) date pair.
pub fn resolve_period(token: &str) -> Result<(NaiveDate, NaiveDate)> {
    Ok(MeasurementPeriod::parse(token)?.date_range())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_every_month_of_a_year() {
        let expected_last = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (i, last) in expected_last.iter().enumerate() {
            let month = i as u32 + 1;
            let (s, e) = resolve_period(&format!("2023-{month:02}")).unwrap();
            assert_eq!(s, ymd(2023, month, 1));
            assert_eq!(e, ymd(2023, month, *last));
        }
    }

    #[test]
    fn test_resolve_february_leap_years() {
        assert_eq!(resolve_period("2024-02").unwrap().1, ymd(2024, 2, 29));
        assert_eq!(resolve_period("2023-02").unwrap().1, ymd(2023, 2, 28));
        assert_eq!(resolve_period("2000-02").unwrap().1, ymd(2000, 2, 29));
        assert_eq!(resolve_period("1900-02").unwrap().1, ymd(1900, 2, 28));
    }

    #[test]
    fn test_parse_month() {
        let p = MeasurementPeriod::parse("2025-11").unwrap();
        assert_eq!(p.year(), 2025);
        assert_eq!(p.month(), 11);
        assert_eq!(p.to_key(), "2025-11");
    }

    #[test]
    fn test_parse_single_digit_month_normalises_key() {
        let p = MeasurementPeriod::parse("2025-3").unwrap();
        assert_eq!(p.to_key(), "2025-03");
        assert_eq!(p.to_string(), "2025-03");
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["garbage", "2025-13", "2025-00", "2025", "2025-Q1", "25-01", "2025-01-01", ""] {
            match MeasurementPeriod::parse(bad) {
                Err(Error::MalformedPeriod(_)) => {}
                other => panic!("expected MalformedPeriod for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_previous() {
        let jan = MeasurementPeriod::parse("2025-01").unwrap();
        assert_eq!(jan.previous().unwrap().to_key(), "2024-12");
        let jun = MeasurementPeriod::parse("2025-06").unwrap();
        assert_eq!(jun.previous().unwrap().to_key(), "2025-05");
    }

    #[test]
    fn test_containing_and_contains() {
        let p = MeasurementPeriod::containing(ymd(2024, 2, 17));
        assert_eq!(p, MeasurementPeriod::parse("2024-02").unwrap());
        assert!(p.contains(ymd(2024, 2, 1)));
        assert!(p.contains(ymd(2024, 2, 29)));
        assert!(!p.contains(ymd(2024, 3, 1)));
    }

    #[test]
    fn test_from_str() {
        let p: MeasurementPeriod = "2025-07".parse().unwrap();
        assert_eq!(p.date_range(), (ymd(2025, 7, 1), ymd(2025, 7, 31)));
    }
}
