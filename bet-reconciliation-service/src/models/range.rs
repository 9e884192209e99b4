//! Inclusive calendar-date window used by the ranged report variants.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// Both bounds are date-only; time of day never participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if start > end {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Start date {} is after end date {}",
                start,
                end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds; a trailing time component is dropped.
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        let parse = |s: &str| {
            crate::services::dates::parse_iso_date(s).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Invalid date '{}', expected YYYY-MM-DD", s))
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Contains check over a `YYYY-MM-DD` key. Unparseable keys such as
    /// `Unknown` are outside every range.
    pub fn contains_key(&self, key: &str) -> bool {
        crate::services::dates::parse_iso_date(key)
            .map(|d| self.contains(d))
            .unwrap_or(false)
    }
}
