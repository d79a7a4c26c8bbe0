//! FX rate lookups

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::FxRatePeriod;

use crate::error::AppResult;
use crate::services::{FxRateProvider, PgFxRateProvider};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub date: NaiveDate,
}

/// List FX periods
pub async fn list_fx_periods(State(state): State<AppState>) -> AppResult<Json<Vec<FxRatePeriod>>> {
    let provider = PgFxRateProvider::new(state.db);
    let periods = provider.list_periods().await?;
    Ok(Json(periods))
}

/// Period effective on a date
pub async fn get_effective_period(
    State(state): State<AppState>,
    Query(query): Query<RateQuery>,
) -> AppResult<Json<FxRatePeriod>> {
    let period = state.fx.period_on(query.date).await?;
    Ok(Json(period))
}
