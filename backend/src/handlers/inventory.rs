//! HTTP handlers for the inventory ledger

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{Balance, Movement, MovementRef};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ledger::{AdjustStockInput, BalanceView, LedgerPosting, MovementFilter};
use crate::services::InventoryLedger;
use crate::AppState;

/// Post a manual stock adjustment
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<LedgerPosting>> {
    let ledger = InventoryLedger::new(state.db);
    let posting = ledger.adjust(input).await?;
    Ok(Json(posting))
}

/// Get the balance of one product
pub async fn get_balance(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Balance>> {
    let ledger = InventoryLedger::new(state.db);
    let balance = ledger.get_balance(product_id).await?;
    Ok(Json(balance))
}

/// List all balances with their value
pub async fn list_balances(State(state): State<AppState>) -> AppResult<Json<Vec<BalanceView>>> {
    let ledger = InventoryLedger::new(state.db);
    let balances = ledger.list_balances().await?;
    Ok(Json(balances))
}

/// List journal entries
pub async fn list_movements(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<Vec<Movement>>> {
    let ledger = InventoryLedger::new(state.db);
    let movements = ledger.list_movements(filter).await?;
    Ok(Json(movements))
}

/// Movements caused by a lot
pub async fn get_lot_movements(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<Vec<Movement>>> {
    let ledger = InventoryLedger::new(state.db);
    let movements = ledger
        .movements_for_ref(&MovementRef::Lot { id: lot_id })
        .await?;
    Ok(Json(movements))
}

/// Movements caused by an invoice
pub async fn get_invoice_movements(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<Vec<Movement>>> {
    let ledger = InventoryLedger::new(state.db);
    let movements = ledger
        .movements_for_ref(&MovementRef::Invoice { id: invoice_id })
        .await?;
    Ok(Json(movements))
}
