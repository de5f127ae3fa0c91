//! Archive periods and period selection.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A (year, month) pair; the unit of incremental crawl and extraction work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Create a period, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::validation(format!("invalid month: {month}")));
        }
        Ok(Self { year, month })
    }

    /// The period containing today's UTC date.
    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The following month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Canonical date index URL for this period under `base_url`.
    pub fn index_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{:02}/maillist.html",
            base_url.trim_end_matches('/'),
            self.year,
            self.month
        )
    }

    /// Storage key, `YYYY-MM`. Sorts chronologically.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| AppError::validation(format!("invalid period '{s}', use YYYY-MM")))?;
        let year: i32 = year
            .parse()
            .map_err(|_| AppError::validation(format!("invalid year in '{s}'")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| AppError::validation(format!("invalid month in '{s}'")))?;
        Self::new(year, month)
    }
}

/// Restricts which periods the pipeline processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodRange {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl PeriodRange {
    /// Build a selector from optional CLI filters.
    pub fn new(year: Option<i32>, month: Option<u32>) -> Result<Self> {
        match (year, month) {
            (None, Some(_)) => Err(AppError::validation("--month requires --year")),
            (_, Some(m)) if !(1..=12).contains(&m) => {
                Err(AppError::validation(format!("invalid month: {m}")))
            }
            _ => Ok(Self { year, month }),
        }
    }

    pub fn contains(&self, period: Period) -> bool {
        self.year.is_none_or(|y| y == period.year) && self.month.is_none_or(|m| m == period.month)
    }

    /// All selected periods from `first` through `last`, inclusive.
    pub fn periods(&self, first: Period, last: Period) -> Vec<Period> {
        let mut periods = Vec::new();
        let mut period = first;
        while period <= last {
            if self.contains(period) {
                periods.push(period);
            }
            period = period.next();
        }
        periods
    }
}
