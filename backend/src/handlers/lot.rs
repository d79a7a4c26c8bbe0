//! HTTP handlers for receiving lots

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{Lot, ReceiveLotInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::costing::ReceivedLot;
use crate::services::CostingService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LotListQuery {
    pub product_id: Option<Uuid>,
}

fn costing_service(state: AppState) -> CostingService {
    CostingService::new(state.db, state.config.pricing.clone(), state.fx)
}

/// Receive a lot into stock
pub async fn receive_lot(
    State(state): State<AppState>,
    Json(input): Json<ReceiveLotInput>,
) -> AppResult<Json<ReceivedLot>> {
    let received = costing_service(state).receive_lot(input).await?;
    Ok(Json(received))
}

/// Get a lot by id
pub async fn get_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<Lot>> {
    let lot = costing_service(state).get_lot(lot_id).await?;
    Ok(Json(lot))
}

/// List lots
pub async fn list_lots(
    State(state): State<AppState>,
    Query(query): Query<LotListQuery>,
) -> AppResult<Json<Vec<Lot>>> {
    let lots = costing_service(state).list_lots(query.product_id).await?;
    Ok(Json(lots))
}
