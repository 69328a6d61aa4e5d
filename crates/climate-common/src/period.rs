//! Period codec: the date-range and month-bucket keys that identify one
//! unit of pipeline work.
//!
//! Every field is a fixed-width, zero-padded string ("2016", "03", "07"),
//! which is what makes lexicographic min/max date-correct in
//! [`RangePeriod::from_sets`].

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Hour steps of a full reanalysis day, as submitted to the archive.
pub const HOUR_STEPS: [&str; 24] = [
    "00:00", "01:00", "02:00", "03:00", "04:00", "05:00", "06:00", "07:00",
    "08:00", "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00",
    "16:00", "17:00", "18:00", "19:00", "20:00", "21:00", "22:00", "23:00",
];

/// Two-digit calendar months, in order.
pub const ALL_MONTHS: [&str; 12] = [
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12",
];

/// Ordered day-of-month strings for a calendar month.
///
/// February uses the simplified leap rule `year % 4 == 0`. The Gregorian
/// century exception is deliberately not applied; 1900 and 2100 come back
/// with 29 days. Callers targeting dates outside 1901–2099 must account
/// for this.
pub fn month_days(month: &str, year: &str) -> PipelineResult<Vec<String>> {
    let count = match month {
        "01" | "03" | "05" | "07" | "08" | "10" | "12" => 31,
        "04" | "06" | "09" | "11" => 30,
        "02" => {
            let y: i64 = year
                .parse()
                .map_err(|_| PipelineError::InvalidPeriod(format!("bad year: {year}")))?;
            if y % 4 == 0 {
                29
            } else {
                28
            }
        }
        other => {
            return Err(PipelineError::InvalidPeriod(format!("bad month: {other}")));
        }
    };

    Ok((1..=count).map(|d| format!("{d:02}")).collect())
}

/// A contiguous date span encoded as `YYYYMMDD_to_YYYYMMDD`.
///
/// Produced from a (year, month) pair plus full calendar-day enumeration;
/// the start date's month (characters 4..6) links a range period to its
/// climatological baseline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangePeriod(String);

impl RangePeriod {
    /// Build the range key from sets of comparable date fields.
    ///
    /// Min/max are lexicographic over each set independently, which is
    /// date-correct because all fields are fixed-width zero-padded. Hours
    /// are accepted for symmetry with the archive request but do not
    /// appear in the key.
    pub fn from_sets<S: AsRef<str>>(
        years: &[S],
        months: &[S],
        days: &[S],
        _times: &[S],
    ) -> PipelineResult<Self> {
        let bounds = |set: &[S], what: &str| -> PipelineResult<(String, String)> {
            let min = set
                .iter()
                .map(|s| s.as_ref())
                .min()
                .ok_or_else(|| PipelineError::InvalidPeriod(format!("empty {what} set")))?;
            let max = set.iter().map(|s| s.as_ref()).max().unwrap_or(min);
            Ok((min.to_string(), max.to_string()))
        };

        let (min_yr, max_yr) = bounds(years, "year")?;
        let (min_mo, max_mo) = bounds(months, "month")?;
        let (min_dy, max_dy) = bounds(days, "day")?;

        Ok(Self(format!(
            "{min_yr}{min_mo}{min_dy}_to_{max_yr}{max_mo}{max_dy}"
        )))
    }

    /// Full calendar range of one (year, month) pair.
    pub fn for_month(year: &str, month: &str) -> PipelineResult<Self> {
        let days = month_days(month, year)?;
        Self::from_sets(
            &[year.to_string()],
            &[month.to_string()],
            &days,
            &HOUR_STEPS.map(String::from),
        )
    }

    /// Parse an existing key, validating the `YYYYMMDD_to_YYYYMMDD` shape.
    pub fn parse(key: &str) -> PipelineResult<Self> {
        let valid = key.len() == 20
            && &key[8..12] == "_to_"
            && key[0..8].bytes().all(|b| b.is_ascii_digit())
            && key[12..20].bytes().all(|b| b.is_ascii_digit());
        if !valid {
            return Err(PipelineError::InvalidPeriod(format!(
                "expected YYYYMMDD_to_YYYYMMDD, got {key:?}"
            )));
        }
        Ok(Self(key.to_string()))
    }

    /// The string key used for artifact addressing.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// Start date (`YYYYMMDD`).
    pub fn start(&self) -> &str {
        &self.0[0..8]
    }

    /// End date (`YYYYMMDD`).
    pub fn end(&self) -> &str {
        &self.0[12..20]
    }

    /// Calendar month of the start date (characters 4..6 of the key).
    pub fn month(&self) -> &str {
        &self.0[4..6]
    }
}

impl std::fmt::Display for RangePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar-month bucket for climatological baselines.
///
/// `All` is the empty-key bucket: every download regardless of month,
/// producing the all-time baseline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonthBucket {
    Month(String),
    All,
}

impl MonthBucket {
    /// Bucket for a two-digit month string; empty string means `All`.
    pub fn from_key(key: &str) -> PipelineResult<Self> {
        if key.is_empty() {
            return Ok(Self::All);
        }
        if ALL_MONTHS.contains(&key) {
            Ok(Self::Month(key.to_string()))
        } else {
            Err(PipelineError::InvalidPeriod(format!("bad month bucket: {key:?}")))
        }
    }

    /// The key used in artifact names ("01".."12", or "" for `All`).
    pub fn key(&self) -> &str {
        match self {
            Self::Month(m) => m,
            Self::All => "",
        }
    }

    /// Whether a range period falls in this bucket.
    pub fn matches(&self, period: &RangePeriod) -> bool {
        match self {
            Self::Month(m) => period.month() == m,
            Self::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_days_regular() {
        assert_eq!(month_days("01", "2016").unwrap().len(), 31);
        assert_eq!(month_days("04", "2016").unwrap().len(), 30);
        assert_eq!(month_days("02", "2015").unwrap().len(), 28);
        assert_eq!(
            month_days("09", "2020").unwrap().first().map(String::as_str),
            Some("01")
        );
    }

    #[test]
    fn test_month_days_leap() {
        assert_eq!(month_days("02", "2016").unwrap().len(), 29);
        // Simplified rule: the century exception is intentionally absent.
        assert_eq!(month_days("02", "1900").unwrap().len(), 29);
    }

    #[test]
    fn test_month_days_invalid() {
        assert!(month_days("13", "2016").is_err());
        assert!(month_days("02", "twenty").is_err());
    }

    #[test]
    fn test_range_key_for_month() {
        let p = RangePeriod::for_month("2016", "03").unwrap();
        assert_eq!(p.key(), "20160301_to_20160331");
        assert_eq!(p.start(), "20160301");
        assert_eq!(p.end(), "20160331");
    }

    #[test]
    fn test_month_round_trip() {
        for month in ALL_MONTHS {
            let p = RangePeriod::for_month("2016", month).unwrap();
            assert_eq!(p.month(), month);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(RangePeriod::parse("20160301_to_20160331").is_ok());
        assert!(RangePeriod::parse("2016031_to_20160331").is_err());
        assert!(RangePeriod::parse("20160301-to-20160331").is_err());
        assert!(RangePeriod::parse("").is_err());
    }

    #[test]
    fn test_month_bucket() {
        let p = RangePeriod::for_month("2016", "03").unwrap();
        assert!(MonthBucket::from_key("03").unwrap().matches(&p));
        assert!(!MonthBucket::from_key("04").unwrap().matches(&p));
        assert!(MonthBucket::All.matches(&p));
        assert_eq!(MonthBucket::from_key("").unwrap(), MonthBucket::All);
        assert!(MonthBucket::from_key("13").is_err());
    }
}
