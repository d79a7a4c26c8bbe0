//! Quote batches and per-product price snapshots
//!
//! Pricing is lock-free and never touches the ledger. A line is computed
//! explicitly before it is persisted; saving never recomputes anything.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    compute_quote_line, resolve_final_price, validate_non_negative, validate_price,
    validate_quote_line_input, validate_rate, CoreError, PricingDefaults, QuoteBatch, QuoteLine,
    QuoteLineInput, QuotePricing, TransportMode,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::fx::FxRateProvider;
use crate::services::product::fetch_active_product;

const BATCH_COLUMNS: &str = "id, name, fx_period_id, fx_rate_snapshot, company_margin_rate, \
     supplier_markup_rate, rounding_unit_php, ocean_krw_per_kg, air_krw_per_kg, memo, created_at";

const LINE_COLUMNS: &str = "id, batch_id, product_id, transport_mode, qty, supplier_cost_krw_per_unit, \
     billable_weight_kg, other_cost_php, fx_rate_snapshot, supplier_pay_php_per_unit, \
     transport_php_total, transport_php_per_unit, base_price, manual_price, final_price, created_at";

/// Quote service for batches and lines
#[derive(Clone)]
pub struct QuoteService {
    db: PgPool,
    defaults: PricingDefaults,
    fx: Arc<dyn FxRateProvider>,
}

#[derive(Debug, FromRow)]
struct QuoteBatchRow {
    id: Uuid,
    name: String,
    fx_period_id: Uuid,
    fx_rate_snapshot: Decimal,
    company_margin_rate: Decimal,
    supplier_markup_rate: Decimal,
    rounding_unit_php: Decimal,
    ocean_krw_per_kg: Decimal,
    air_krw_per_kg: Decimal,
    memo: String,
    created_at: DateTime<Utc>,
}

impl From<QuoteBatchRow> for QuoteBatch {
    fn from(row: QuoteBatchRow) -> Self {
        QuoteBatch {
            id: row.id,
            name: row.name,
            fx_period_id: row.fx_period_id,
            fx_rate_snapshot: row.fx_rate_snapshot,
            company_margin_rate: row.company_margin_rate,
            supplier_markup_rate: row.supplier_markup_rate,
            rounding_unit_php: row.rounding_unit_php,
            ocean_krw_per_kg: row.ocean_krw_per_kg,
            air_krw_per_kg: row.air_krw_per_kg,
            memo: row.memo,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct QuoteLineRow {
    id: Uuid,
    batch_id: Uuid,
    product_id: Uuid,
    transport_mode: Option<String>,
    qty: Decimal,
    supplier_cost_krw_per_unit: Decimal,
    billable_weight_kg: Decimal,
    other_cost_php: Decimal,
    fx_rate_snapshot: Decimal,
    supplier_pay_php_per_unit: Decimal,
    transport_php_total: Decimal,
    transport_php_per_unit: Decimal,
    base_price: Decimal,
    manual_price: Option<Decimal>,
    final_price: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuoteLineRow> for QuoteLine {
    type Error = AppError;

    fn try_from(row: QuoteLineRow) -> Result<Self, Self::Error> {
        let transport_mode = row
            .transport_mode
            .as_deref()
            .map(|m| {
                TransportMode::parse(m)
                    .ok_or_else(|| AppError::Internal(format!("unknown transport mode '{}'", m)))
            })
            .transpose()?;

        Ok(QuoteLine {
            id: row.id,
            batch_id: row.batch_id,
            product_id: row.product_id,
            transport_mode,
            qty: row.qty,
            supplier_cost_krw_per_unit: row.supplier_cost_krw_per_unit,
            billable_weight_kg: row.billable_weight_kg,
            other_cost_php: row.other_cost_php,
            fx_rate_snapshot: row.fx_rate_snapshot,
            supplier_pay_php_per_unit: row.supplier_pay_php_per_unit,
            transport_php_total: row.transport_php_total,
            transport_php_per_unit: row.transport_php_per_unit,
            base_price: row.base_price,
            manual_price: row.manual_price,
            final_price: row.final_price,
            created_at: row.created_at,
        })
    }
}

/// Input for creating a quote batch. Unset rates fall back to the defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuoteBatchInput {
    pub name: String,
    /// Date whose FX period is snapshotted; today when omitted
    pub fx_date: Option<NaiveDate>,
    pub company_margin_rate: Option<Decimal>,
    pub supplier_markup_rate: Option<Decimal>,
    pub rounding_unit_php: Option<Decimal>,
    pub ocean_krw_per_kg: Option<Decimal>,
    pub air_krw_per_kg: Option<Decimal>,
    pub memo: Option<String>,
}

/// Manual override of a quote line's final price; `None` clears it
#[derive(Debug, Clone, Deserialize)]
pub struct SetManualPriceInput {
    pub manual_price: Option<Decimal>,
}

/// Quote line with its price variance
#[derive(Debug, Clone, Serialize)]
pub struct QuoteLineView {
    #[serde(flatten)]
    pub line: QuoteLine,
    pub variance_percent: Option<Decimal>,
}

impl From<QuoteLine> for QuoteLineView {
    fn from(line: QuoteLine) -> Self {
        let variance_percent = line.variance_percent();
        Self {
            line,
            variance_percent,
        }
    }
}

impl QuoteService {
    /// Create a new QuoteService instance
    pub fn new(db: PgPool, defaults: PricingDefaults, fx: Arc<dyn FxRateProvider>) -> Self {
        Self { db, defaults, fx }
    }

    /// Create a batch, snapshotting the FX rate effective on `fx_date`
    pub async fn create_batch(&self, input: CreateQuoteBatchInput) -> AppResult<QuoteBatch> {
        if input.name.trim().is_empty() {
            return Err(AppError::validation("name", "Batch name is required"));
        }

        let margin = input
            .company_margin_rate
            .unwrap_or(self.defaults.company_margin_rate);
        let markup = input
            .supplier_markup_rate
            .unwrap_or(self.defaults.supplier_markup_rate);
        let rounding = input
            .rounding_unit_php
            .unwrap_or(self.defaults.rounding_unit_php);
        let ocean = input.ocean_krw_per_kg.unwrap_or(self.defaults.ocean_krw_per_kg);
        let air = input.air_krw_per_kg.unwrap_or(self.defaults.air_krw_per_kg);

        validate_rate(margin).map_err(|e| AppError::validation("company_margin_rate", e))?;
        validate_rate(markup).map_err(|e| AppError::validation("supplier_markup_rate", e))?;
        validate_non_negative(ocean).map_err(|e| AppError::validation("ocean_krw_per_kg", e))?;
        validate_non_negative(air).map_err(|e| AppError::validation("air_krw_per_kg", e))?;

        let fx_date = input.fx_date.unwrap_or_else(|| Utc::now().date_naive());
        let period = self.fx.period_on(fx_date).await?;

        let row = sqlx::query_as::<_, QuoteBatchRow>(&format!(
            r#"
            INSERT INTO quote_batches (
                name, fx_period_id, fx_rate_snapshot, company_margin_rate, supplier_markup_rate,
                rounding_unit_php, ocean_krw_per_kg, air_krw_per_kg, memo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(period.id)
        .bind(period.krw_to_php)
        .bind(margin)
        .bind(markup)
        .bind(rounding)
        .bind(ocean)
        .bind(air)
        .bind(input.memo.as_deref().unwrap_or_default())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            batch_id = %row.id,
            fx_rate = %row.fx_rate_snapshot,
            "Quote batch created"
        );

        Ok(row.into())
    }

    /// Get a batch by id
    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<QuoteBatch> {
        let mut conn = self.db.acquire().await?;
        fetch_batch(&mut conn, batch_id).await
    }

    /// List batches, newest first
    pub async fn list_batches(&self) -> AppResult<Vec<QuoteBatch>> {
        let rows = sqlx::query_as::<_, QuoteBatchRow>(&format!(
            "SELECT {} FROM quote_batches ORDER BY created_at DESC",
            BATCH_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(QuoteBatch::from).collect())
    }

    /// Price a line against the batch without persisting it
    pub async fn preview_line(&self, batch_id: Uuid, input: QuoteLineInput) -> AppResult<QuotePricing> {
        let mut conn = self.db.acquire().await?;
        price_line(&mut conn, batch_id, &input).await.map(|(_, pricing)| pricing)
    }

    /// Price a line and store its snapshot
    pub async fn add_line(&self, batch_id: Uuid, input: QuoteLineInput) -> AppResult<QuoteLineView> {
        let mut conn = self.db.acquire().await?;
        let (batch, pricing) = price_line(&mut conn, batch_id, &input).await?;

        let row = sqlx::query_as::<_, QuoteLineRow>(&format!(
            r#"
            INSERT INTO quote_lines (
                batch_id, product_id, transport_mode, qty, supplier_cost_krw_per_unit,
                billable_weight_kg, other_cost_php, fx_rate_snapshot, supplier_pay_php_per_unit,
                transport_php_total, transport_php_per_unit, base_price, manual_price, final_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            LINE_COLUMNS
        ))
        .bind(batch.id)
        .bind(input.product_id)
        .bind(input.transport_mode.map(|m| m.as_str()))
        .bind(input.qty)
        .bind(input.supplier_cost_krw_per_unit)
        .bind(input.billable_weight_kg)
        .bind(input.other_cost_php)
        .bind(pricing.fx_rate)
        .bind(pricing.supplier_pay_php_per_unit)
        .bind(pricing.transport_php_total)
        .bind(pricing.transport_php_per_unit)
        .bind(pricing.base_price)
        .bind(input.manual_price)
        .bind(pricing.final_price)
        .fetch_one(&mut *conn)
        .await?;

        let line = QuoteLine::try_from(row)?;
        Ok(line.into())
    }

    /// Set or clear the manual price; the base price is left untouched
    pub async fn set_manual_price(
        &self,
        line_id: Uuid,
        input: SetManualPriceInput,
    ) -> AppResult<QuoteLineView> {
        if let Some(manual) = input.manual_price {
            validate_price(manual).map_err(|e| AppError::validation("manual_price", e))?;
        }

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, QuoteLineRow>(&format!(
            "SELECT {} FROM quote_lines WHERE id = $1 FOR UPDATE",
            LINE_COLUMNS
        ))
        .bind(line_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::not_found("quote line", line_id))?;

        let batch = fetch_batch(&mut tx, current.batch_id).await?;
        let final_price =
            resolve_final_price(current.base_price, batch.rounding_unit_php, input.manual_price)?;

        let row = sqlx::query_as::<_, QuoteLineRow>(&format!(
            r#"
            UPDATE quote_lines
            SET manual_price = $2, final_price = $3
            WHERE id = $1
            RETURNING {}
            "#,
            LINE_COLUMNS
        ))
        .bind(line_id)
        .bind(input.manual_price)
        .bind(final_price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let line = QuoteLine::try_from(row)?;
        Ok(line.into())
    }

    /// Delete one line from a batch.
    ///
    /// Issued invoices keep the prices they were issued at; drafts pick up
    /// the next latest line for the product when they are issued.
    pub async fn delete_line(&self, batch_id: Uuid, line_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        fetch_batch(&mut tx, batch_id).await?;

        let result = sqlx::query("DELETE FROM quote_lines WHERE id = $1 AND batch_id = $2")
            .bind(line_id)
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("quote line", line_id).into());
        }

        tx.commit().await?;

        tracing::info!(%batch_id, %line_id, "Quote line deleted");
        Ok(())
    }

    /// Lines of a batch in entry order
    pub async fn list_lines(&self, batch_id: Uuid) -> AppResult<Vec<QuoteLineView>> {
        let mut conn = self.db.acquire().await?;
        fetch_batch(&mut conn, batch_id).await?;

        let rows = sqlx::query_as::<_, QuoteLineRow>(&format!(
            "SELECT {} FROM quote_lines WHERE batch_id = $1 ORDER BY created_at, id",
            LINE_COLUMNS
        ))
        .bind(batch_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| QuoteLine::try_from(row).map(QuoteLineView::from))
            .collect()
    }

    /// The most recent line for a product in a batch
    pub async fn latest_line_for(&self, batch_id: Uuid, product_id: Uuid) -> AppResult<QuoteLine> {
        let mut conn = self.db.acquire().await?;
        let line = latest_line_for(&mut conn, batch_id, product_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found("quote line", format!("{}/{}", batch_id, product_id))
            })?;
        Ok(line)
    }
}

async fn fetch_batch(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<QuoteBatch> {
    let row = sqlx::query_as::<_, QuoteBatchRow>(&format!(
        "SELECT {} FROM quote_batches WHERE id = $1",
        BATCH_COLUMNS
    ))
    .bind(batch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("quote batch", batch_id))?;

    Ok(row.into())
}

async fn price_line(
    conn: &mut PgConnection,
    batch_id: Uuid,
    input: &QuoteLineInput,
) -> AppResult<(QuoteBatch, QuotePricing)> {
    validate_quote_line_input(input).map_err(|(field, msg)| AppError::validation(field, msg))?;

    let batch = fetch_batch(conn, batch_id).await?;
    let product = fetch_active_product(conn, input.product_id, "quote").await?;

    let pricing = compute_quote_line(&batch.settings(), input, product.default_transport_mode)?;

    tracing::debug!(
        batch_id = %batch.id,
        sku = %product.sku_code,
        mode = %pricing.transport_mode,
        base_price = %pricing.base_price,
        final_price = %pricing.final_price,
        "Quote line priced"
    );

    Ok((batch, pricing))
}

/// Latest quote line for `(batch, product)`, by creation time
pub(crate) async fn latest_line_for(
    conn: &mut PgConnection,
    batch_id: Uuid,
    product_id: Uuid,
) -> AppResult<Option<QuoteLine>> {
    let row = sqlx::query_as::<_, QuoteLineRow>(&format!(
        r#"
        SELECT {}
        FROM quote_lines
        WHERE batch_id = $1 AND product_id = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
        LINE_COLUMNS
    ))
    .bind(batch_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(QuoteLine::try_from).transpose()
}
