//! FX snapshot provider (KRW → PHP)
//!
//! The core asks for "the rate on date D" exactly once per lot or quote batch
//! and copies the value. Period maintenance happens outside this server.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{CoreError, FxRatePeriod};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;

/// Source of effective exchange rates
#[async_trait]
pub trait FxRateProvider: Send + Sync {
    /// The period in effect on `date`, or `NotFound`
    async fn period_on(&self, date: NaiveDate) -> AppResult<FxRatePeriod>;

    /// KRW → PHP rate in effect on `date`
    async fn rate_on(&self, date: NaiveDate) -> AppResult<Decimal> {
        Ok(self.period_on(date).await?.krw_to_php)
    }
}

#[derive(Debug, FromRow)]
struct FxRatePeriodRow {
    id: Uuid,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    krw_to_php: Decimal,
    memo: String,
    is_locked: bool,
    created_at: DateTime<Utc>,
}

impl From<FxRatePeriodRow> for FxRatePeriod {
    fn from(row: FxRatePeriodRow) -> Self {
        FxRatePeriod {
            id: row.id,
            start_date: row.start_date,
            end_date: row.end_date,
            krw_to_php: row.krw_to_php,
            memo: row.memo,
            is_locked: row.is_locked,
            created_at: row.created_at,
        }
    }
}

/// Reads `fx_rate_periods`; the latest-starting period containing the date wins
#[derive(Clone)]
pub struct PgFxRateProvider {
    db: PgPool,
}

impl PgFxRateProvider {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All periods, newest first
    pub async fn list_periods(&self) -> AppResult<Vec<FxRatePeriod>> {
        let rows = sqlx::query_as::<_, FxRatePeriodRow>(
            r#"
            SELECT id, start_date, end_date, krw_to_php, memo, is_locked, created_at
            FROM fx_rate_periods
            ORDER BY start_date DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(FxRatePeriod::from).collect())
    }
}

#[async_trait]
impl FxRateProvider for PgFxRateProvider {
    async fn period_on(&self, date: NaiveDate) -> AppResult<FxRatePeriod> {
        let row = sqlx::query_as::<_, FxRatePeriodRow>(
            r#"
            SELECT id, start_date, end_date, krw_to_php, memo, is_locked, created_at
            FROM fx_rate_periods
            WHERE start_date <= $1 AND (end_date IS NULL OR $1 <= end_date)
            ORDER BY start_date DESC
            LIMIT 1
            "#,
        )
        .bind(date)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CoreError::not_found("fx rate period", date))?;

        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::effective_period;
    use std::str::FromStr;

    /// In-memory provider over a fixed period list
    struct StaticFx(Vec<FxRatePeriod>);

    #[async_trait]
    impl FxRateProvider for StaticFx {
        async fn period_on(&self, date: NaiveDate) -> AppResult<FxRatePeriod> {
            effective_period(&self.0, date)
                .cloned()
                .ok_or_else(|| CoreError::not_found("fx rate period", date).into())
        }
    }

    fn period(start: NaiveDate, end: Option<NaiveDate>, rate: &str) -> FxRatePeriod {
        FxRatePeriod {
            id: Uuid::new_v4(),
            start_date: start,
            end_date: end,
            krw_to_php: Decimal::from_str(rate).unwrap(),
            memo: String::new(),
            is_locked: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_rate_on_uses_period() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let jan_end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let fx = StaticFx(vec![period(jan, Some(jan_end), "0.045")]);

        let rate = tokio_test::block_on(fx.rate_on(jan_end)).unwrap();
        assert_eq!(rate, Decimal::from_str("0.045").unwrap());

        let feb = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let err = tokio_test::block_on(fx.rate_on(feb)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Core(CoreError::NotFound { .. })
        ));
    }
}
