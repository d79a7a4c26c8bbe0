//! Receiving and landed-cost snapshots
//!
//! A receipt freezes every volatile input (FX, markup, freight) onto the lot
//! and folds the landed unit cost into the product's moving average, all in
//! one transaction.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    compute_landed_cost, validate_receive_input, Balance, CoreError, LandedCostInput, Lot,
    Movement, MovementRef, PartnerType, PricingDefaults, ReceiveLotInput, TransportMode,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::fx::FxRateProvider;
use crate::services::ledger;
use crate::services::product::{fetch_active_product, fetch_partner};

const LOT_COLUMNS: &str = "id, product_id, supplier_id, received_date, qty_received, qty_remaining, \
     fx_rate_snapshot, supplier_cost_krw_per_unit, supplier_markup_rate_snapshot, transport_mode, \
     transport_krw_per_kg_snapshot, billable_weight_kg_total, other_cost_php_total, \
     transport_php_total_snapshot, landed_cost_php_total, landed_cost_php_per_unit, memo, created_at";

/// Costing service for lot receipts
#[derive(Clone)]
pub struct CostingService {
    db: PgPool,
    defaults: PricingDefaults,
    fx: Arc<dyn FxRateProvider>,
}

#[derive(Debug, FromRow)]
struct LotRow {
    id: Uuid,
    product_id: Uuid,
    supplier_id: Uuid,
    received_date: NaiveDate,
    qty_received: Decimal,
    qty_remaining: Decimal,
    fx_rate_snapshot: Decimal,
    supplier_cost_krw_per_unit: Decimal,
    supplier_markup_rate_snapshot: Decimal,
    transport_mode: String,
    transport_krw_per_kg_snapshot: Decimal,
    billable_weight_kg_total: Decimal,
    other_cost_php_total: Decimal,
    transport_php_total_snapshot: Decimal,
    landed_cost_php_total: Decimal,
    landed_cost_php_per_unit: Decimal,
    memo: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LotRow> for Lot {
    type Error = AppError;

    fn try_from(row: LotRow) -> Result<Self, Self::Error> {
        let transport_mode = TransportMode::parse(&row.transport_mode).ok_or_else(|| {
            AppError::Internal(format!("unknown transport mode '{}'", row.transport_mode))
        })?;

        Ok(Lot {
            id: row.id,
            product_id: row.product_id,
            supplier_id: row.supplier_id,
            received_date: row.received_date,
            qty_received: row.qty_received,
            qty_remaining: row.qty_remaining,
            fx_rate_snapshot: row.fx_rate_snapshot,
            supplier_cost_krw_per_unit: row.supplier_cost_krw_per_unit,
            supplier_markup_rate_snapshot: row.supplier_markup_rate_snapshot,
            transport_mode,
            transport_krw_per_kg_snapshot: row.transport_krw_per_kg_snapshot,
            billable_weight_kg_total: row.billable_weight_kg_total,
            other_cost_php_total: row.other_cost_php_total,
            transport_php_total_snapshot: row.transport_php_total_snapshot,
            landed_cost_php_total: row.landed_cost_php_total,
            landed_cost_php_per_unit: row.landed_cost_php_per_unit,
            memo: row.memo,
            created_at: row.created_at,
        })
    }
}

/// A committed receipt
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedLot {
    pub lot: Lot,
    pub balance: Balance,
    pub movement: Movement,
}

impl CostingService {
    /// Create a new CostingService instance
    pub fn new(db: PgPool, defaults: PricingDefaults, fx: Arc<dyn FxRateProvider>) -> Self {
        Self { db, defaults, fx }
    }

    /// Receive a lot: snapshot its landed cost and post the IN movement
    pub async fn receive_lot(&self, input: ReceiveLotInput) -> AppResult<ReceivedLot> {
        validate_receive_input(&input).map_err(|(field, msg)| AppError::validation(field, msg))?;

        let fx_rate = match input.fx_rate {
            Some(rate) => rate,
            None => self.fx.rate_on(input.received_date).await?,
        };
        let markup = input
            .supplier_markup_rate
            .unwrap_or(self.defaults.supplier_markup_rate);
        let other_cost_php = input.other_cost_php.unwrap_or(Decimal::ZERO);

        let cost = compute_landed_cost(&LandedCostInput {
            qty: input.qty,
            fx_rate,
            supplier_cost_krw_per_unit: input.supplier_cost_krw_per_unit,
            supplier_markup_rate: markup,
            transport_krw_per_kg: input.transport_krw_per_kg,
            billable_weight_kg: input.billable_weight_kg,
            other_cost_php,
        })?;

        let mut tx = self.db.begin().await?;

        let product = fetch_active_product(&mut tx, input.product_id, "receive").await?;
        let supplier = fetch_partner(&mut tx, input.supplier_id, PartnerType::Supplier).await?;

        let lot_row = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            INSERT INTO inventory_lots (
                product_id, supplier_id, received_date, qty_received, qty_remaining,
                fx_rate_snapshot, supplier_cost_krw_per_unit, supplier_markup_rate_snapshot,
                transport_mode, transport_krw_per_kg_snapshot, billable_weight_kg_total,
                other_cost_php_total, transport_php_total_snapshot, landed_cost_php_total,
                landed_cost_php_per_unit, memo
            )
            VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            LOT_COLUMNS
        ))
        .bind(input.product_id)
        .bind(input.supplier_id)
        .bind(input.received_date)
        .bind(input.qty)
        .bind(fx_rate)
        .bind(input.supplier_cost_krw_per_unit)
        .bind(markup)
        .bind(input.transport_mode.as_str())
        .bind(input.transport_krw_per_kg)
        .bind(input.billable_weight_kg)
        .bind(other_cost_php)
        .bind(cost.transport_php_total)
        .bind(cost.landed_cost_php_total)
        .bind(cost.landed_cost_php_per_unit)
        .bind(input.memo.as_deref().unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;

        let lot = Lot::try_from(lot_row)?;

        let posting = ledger::apply_in(
            &mut tx,
            lot.product_id,
            lot.qty_received,
            lot.landed_cost_php_per_unit,
            MovementRef::Lot { id: lot.id },
            format!("Received from {}", supplier.name),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            lot_id = %lot.id,
            sku = %product.sku_code,
            qty = %lot.qty_received,
            unit_cost = %lot.landed_cost_php_per_unit,
            avg_unit_cost = %posting.balance.avg_unit_cost,
            "Lot received"
        );

        Ok(ReceivedLot {
            lot,
            balance: posting.balance,
            movement: posting.movement,
        })
    }

    /// Get a lot by id
    pub async fn get_lot(&self, lot_id: Uuid) -> AppResult<Lot> {
        let row = sqlx::query_as::<_, LotRow>(&format!(
            "SELECT {} FROM inventory_lots WHERE id = $1",
            LOT_COLUMNS
        ))
        .bind(lot_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CoreError::not_found("lot", lot_id))?;

        row.try_into()
    }

    /// List lots, newest receipt first
    pub async fn list_lots(&self, product_id: Option<Uuid>) -> AppResult<Vec<Lot>> {
        let rows = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            SELECT {}
            FROM inventory_lots
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY received_date DESC, created_at DESC
            "#,
            LOT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Lot::try_from).collect()
    }
}
