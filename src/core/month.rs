use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar month a payment is attributed to, displayed as "YYYY-MM"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid year-month (expected YYYY-MM): {0}")]
pub struct InvalidYearMonth(pub String);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self::from_date(datetime.date())
    }

    /// Number of calendar months from `self` to `later` (negative if `later` is earlier)
    pub fn months_until(self, later: YearMonth) -> i64 {
        (later.year as i64 - self.year as i64) * 12 + later.month as i64 - self.month as i64
    }

    /// Midnight on the first day of the month
    pub fn first_day(self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = InvalidYearMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidYearMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = InvalidYearMonth;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(ym("2025-01"), YearMonth { year: 2025, month: 1 });
        assert_eq!(ym("2025-1").to_string(), "2025-01");
        assert_eq!(ym("2025-12").to_string(), "2025-12");
    }

    #[test]
    fn rejects_invalid() {
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("2025-00".parse::<YearMonth>().is_err());
        assert!("202501".parse::<YearMonth>().is_err());
        assert!("abcd-01".parse::<YearMonth>().is_err());
    }

    #[test]
    fn months_until_across_years() {
        assert_eq!(ym("2025-01").months_until(ym("2025-02")), 1);
        assert_eq!(ym("2025-02").months_until(ym("2025-05")), 3);
        assert_eq!(ym("2025-12").months_until(ym("2026-01")), 1);
        assert_eq!(ym("2025-03").months_until(ym("2025-03")), 0);
    }

    #[test]
    fn ordering_is_chronological() {
        assert!(ym("2024-12") < ym("2025-01"));
        assert!(ym("2025-02") < ym("2025-10"));
    }

    #[test]
    fn from_datetime_and_first_day() {
        let dt = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        let month = YearMonth::from_datetime(dt);
        assert_eq!(month, ym("2025-03"));
        assert_eq!(
            month.first_day(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&ym("2025-04")).unwrap();
        assert_eq!(json, "\"2025-04\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2025-04"));
    }
}
