//! Inventory ledger: the only writer of `inventory_balances` and
//! `stock_movements`.
//!
//! Mutations come in two shapes. The connection-level functions
//! (`lock_balance`, `apply_in`, `record`) run inside a caller's transaction so
//! that receiving and invoicing commit lot/invoice rows together with the stock
//! change. `InventoryLedger` wraps the standalone commands (adjustments) and
//! the read side.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_adjustment_memo, Balance, CoreError, Movement, MovementDraft, MovementRef,
    MovementType, TransactionDirection,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::product::fetch_active_product;

const MOVEMENT_COLUMNS: &str =
    "id, product_id, movement_type, direction, qty, ref_kind, ref_id, memo, created_at";

/// Inventory ledger service
#[derive(Clone)]
pub struct InventoryLedger {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct BalanceRow {
    product_id: Uuid,
    on_hand_qty: Decimal,
    avg_unit_cost: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for Balance {
    fn from(row: BalanceRow) -> Self {
        Balance {
            product_id: row.product_id,
            on_hand_qty: row.on_hand_qty,
            avg_unit_cost: row.avg_unit_cost,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    direction: String,
    qty: Decimal,
    ref_kind: String,
    ref_id: Option<Uuid>,
    memo: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::parse(&row.movement_type).ok_or_else(|| {
            AppError::Internal(format!("unknown movement type '{}'", row.movement_type))
        })?;
        let direction = TransactionDirection::parse(&row.direction).ok_or_else(|| {
            AppError::Internal(format!("unknown movement direction '{}'", row.direction))
        })?;
        let reference = MovementRef::from_parts(&row.ref_kind, row.ref_id, &row.memo)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "movement {} has malformed reference ({}, {:?})",
                    row.id, row.ref_kind, row.ref_id
                ))
            })?;

        Ok(Movement {
            id: row.id,
            product_id: row.product_id,
            movement_type,
            direction,
            qty: row.qty,
            reference,
            memo: row.memo,
            created_at: row.created_at,
        })
    }
}

/// Balance joined with product labels, for listings
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub product_id: Uuid,
    pub sku_code: String,
    pub name_en: String,
    pub base_unit: String,
    pub on_hand_qty: Decimal,
    pub avg_unit_cost: Decimal,
    pub inventory_value: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BalanceViewRow {
    product_id: Uuid,
    sku_code: String,
    name_en: String,
    base_unit: String,
    on_hand_qty: Decimal,
    avg_unit_cost: Decimal,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BalanceViewRow> for BalanceView {
    type Error = AppError;

    fn try_from(row: BalanceViewRow) -> Result<Self, Self::Error> {
        let balance = Balance {
            product_id: row.product_id,
            on_hand_qty: row.on_hand_qty,
            avg_unit_cost: row.avg_unit_cost,
            updated_at: row.updated_at,
        };
        Ok(BalanceView {
            product_id: row.product_id,
            sku_code: row.sku_code,
            name_en: row.name_en,
            base_unit: row.base_unit,
            on_hand_qty: row.on_hand_qty,
            avg_unit_cost: balance.effective_avg_cost(),
            inventory_value: balance.inventory_value()?,
            updated_at: row.updated_at,
        })
    }
}

/// Filter for journal listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    /// Inclusive, by movement date (UTC)
    pub from: Option<NaiveDate>,
    /// Inclusive
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Input for a manual stock correction
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockInput {
    pub product_id: Uuid,
    /// Positive adds stock, negative removes it
    pub delta_qty: Decimal,
    pub memo: String,
}

/// Result of a ledger command
#[derive(Debug, Clone, Serialize)]
pub struct LedgerPosting {
    pub balance: Balance,
    pub movement: Movement,
}

// ============================================================================
// Connection-level primitives
// ============================================================================

/// Lock the product's balance row, creating an empty one first if needed.
///
/// Callers touching several products must lock them in ascending id order.
pub(crate) async fn lock_balance(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Balance> {
    sqlx::query(
        r#"
        INSERT INTO inventory_balances (product_id, on_hand_qty, avg_unit_cost)
        VALUES ($1, 0, 0)
        ON CONFLICT (product_id) DO NOTHING
        "#,
    )
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query_as::<_, BalanceRow>(
        r#"
        SELECT product_id, on_hand_qty, avg_unit_cost, updated_at
        FROM inventory_balances
        WHERE product_id = $1
        FOR UPDATE
        "#,
    )
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Lock several balances in the given order
pub(crate) async fn lock_balances(
    conn: &mut PgConnection,
    ordered_product_ids: &[Uuid],
) -> AppResult<BTreeMap<Uuid, Balance>> {
    let mut balances = BTreeMap::new();
    for product_id in ordered_product_ids {
        let balance = lock_balance(conn, *product_id).await?;
        balances.insert(*product_id, balance);
    }
    Ok(balances)
}

async fn save_balance(conn: &mut PgConnection, balance: &Balance) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE inventory_balances
        SET on_hand_qty = $2, avg_unit_cost = $3, updated_at = $4
        WHERE product_id = $1
        "#,
    )
    .bind(balance.product_id)
    .bind(balance.on_hand_qty)
    .bind(balance.avg_unit_cost)
    .bind(balance.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn append_movement(
    conn: &mut PgConnection,
    draft: &MovementDraft,
    now: DateTime<Utc>,
) -> AppResult<Movement> {
    let row = sqlx::query_as::<_, MovementRow>(&format!(
        r#"
        INSERT INTO stock_movements (
            product_id, movement_type, direction, qty, ref_kind, ref_id, memo, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(draft.product_id)
    .bind(draft.movement_type.as_str())
    .bind(draft.direction.as_str())
    .bind(draft.qty)
    .bind(draft.reference.kind())
    .bind(draft.reference.id())
    .bind(&draft.memo)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

/// Persist mutated balances and append their movements.
///
/// `balances` must have been obtained through `lock_balance(s)` in the same
/// transaction.
pub(crate) async fn record(
    conn: &mut PgConnection,
    balances: &BTreeMap<Uuid, Balance>,
    drafts: &[MovementDraft],
    now: DateTime<Utc>,
) -> AppResult<Vec<Movement>> {
    for balance in balances.values() {
        save_balance(conn, balance).await?;
    }

    let mut movements = Vec::with_capacity(drafts.len());
    for draft in drafts {
        movements.push(append_movement(conn, draft, now).await?);
    }
    Ok(movements)
}

/// Receive `qty` at `unit_cost` into the moving average
pub(crate) async fn apply_in(
    conn: &mut PgConnection,
    product_id: Uuid,
    qty: Decimal,
    unit_cost: Decimal,
    reference: MovementRef,
    memo: String,
) -> AppResult<LedgerPosting> {
    let now = Utc::now();
    let mut balance = lock_balance(conn, product_id).await?;
    let draft = balance.apply_in(qty, unit_cost, reference, memo, now)?;

    save_balance(conn, &balance).await?;
    let movement = append_movement(conn, &draft, now).await?;
    Ok(LedgerPosting { balance, movement })
}

/// Whether the journal holds a movement of `movement_type` for `reference`
pub(crate) async fn has_movement(
    conn: &mut PgConnection,
    movement_type: MovementType,
    reference: &MovementRef,
) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM stock_movements
            WHERE ref_kind = $1 AND ref_id = $2 AND movement_type = $3
        )
        "#,
    )
    .bind(reference.kind())
    .bind(reference.id())
    .bind(movement_type.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

// ============================================================================
// Commands and queries
// ============================================================================

impl InventoryLedger {
    /// Create a new InventoryLedger instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Correct the on-hand quantity of a product by a signed delta
    pub async fn adjust(&self, input: AdjustStockInput) -> AppResult<LedgerPosting> {
        validate_adjustment_memo(&input.memo).map_err(|msg| AppError::validation("memo", msg))?;

        let mut tx = self.db.begin().await?;
        fetch_active_product(&mut tx, input.product_id, "adjust stock of").await?;

        let now = Utc::now();
        let mut balance = lock_balance(&mut tx, input.product_id).await?;
        let draft = balance.apply_adjust(input.delta_qty, input.memo, now)?;

        save_balance(&mut tx, &balance).await?;
        let movement = append_movement(&mut tx, &draft, now).await?;
        tx.commit().await?;

        tracing::info!(
            product_id = %input.product_id,
            delta = %input.delta_qty,
            on_hand = %balance.on_hand_qty,
            "Stock adjusted"
        );

        Ok(LedgerPosting { balance, movement })
    }

    /// Current balance; a product never received reads as empty
    pub async fn get_balance(&self, product_id: Uuid) -> AppResult<Balance> {
        let product_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&self.db)
                .await?;

        if !product_exists {
            return Err(CoreError::not_found("product", product_id).into());
        }

        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT product_id, on_hand_qty, avg_unit_cost, updated_at
            FROM inventory_balances
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row
            .map(Balance::from)
            .unwrap_or_else(|| Balance::empty(product_id, Utc::now())))
    }

    /// All balances with valuation, ordered by SKU
    pub async fn list_balances(&self) -> AppResult<Vec<BalanceView>> {
        let rows = sqlx::query_as::<_, BalanceViewRow>(
            r#"
            SELECT b.product_id, p.sku_code, p.name_en, p.base_unit,
                   b.on_hand_qty, b.avg_unit_cost, b.updated_at
            FROM inventory_balances b
            JOIN products p ON p.id = b.product_id
            ORDER BY p.sku_code
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(BalanceView::try_from).collect()
    }

    /// Journal entries, newest first
    pub async fn list_movements(&self, filter: MovementFilter) -> AppResult<Vec<Movement>> {
        let limit = filter.limit.unwrap_or(200).clamp(1, 1000);

        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {}
            FROM stock_movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::varchar IS NULL OR movement_type = $2)
              AND ($3::date IS NULL OR created_at >= $3::date)
              AND ($4::date IS NULL OR created_at < $4::date + 1)
            ORDER BY created_at DESC, id
            LIMIT $5
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(filter.product_id)
        .bind(filter.movement_type.map(|t| t.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }

    /// Every movement caused by a lot or an invoice, oldest first
    pub async fn movements_for_ref(&self, reference: &MovementRef) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {}
            FROM stock_movements
            WHERE ref_kind = $1 AND ref_id IS NOT DISTINCT FROM $2
            ORDER BY created_at, id
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(reference.kind())
        .bind(reference.id())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }
}
