//! FX rate periods (KRW → PHP)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A manually maintained exchange-rate period.
///
/// Lots and quotes copy `krw_to_php` at creation time; they never keep a
/// live reference to the period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxRatePeriod {
    pub id: Uuid,
    pub start_date: NaiveDate,
    /// `None` means the period is open-ended
    pub end_date: Option<NaiveDate>,
    pub krw_to_php: Decimal,
    pub memo: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

impl FxRatePeriod {
    /// Whether `date` falls inside the period (end date inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.end_date {
            None => self.start_date <= date,
            Some(end) => self.start_date <= date && date <= end,
        }
    }
}

/// Pick the effective period for `date`: the latest-starting one that contains it
pub fn effective_period(periods: &[FxRatePeriod], date: NaiveDate) -> Option<&FxRatePeriod> {
    periods
        .iter()
        .filter(|p| p.contains(date))
        .max_by_key(|p| p.start_date)
}
