//! Sales invoice lifecycle: DRAFT → ISSUED → CANCELLED
//!
//! Issue and cancel run in one transaction each and lock rows in a fixed
//! order: invoice, then its lines, then balances by ascending product id.
//! The movement journal doubles as the idempotency record: a draft that
//! already has OUT movements, or an issued invoice that already has restoring
//! IN movements, is refused with `CorruptState` and never repaired.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    apply_cancel, apply_issue, check_cancel, check_issue, ensure_positive,
    generate_invoice_number, invoice_total, lock_line_prices, lock_order, validate_price,
    CoreError, CreateInvoiceInput, InvoiceLineInput, InvoiceStatus, IssueDecision, MovementRef,
    MovementType, PartnerType, SalesInvoice, SalesInvoiceLine,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger;
use crate::services::product::{fetch_active_product, fetch_partner};
use crate::services::quoting::latest_line_for;

const INVOICE_COLUMNS: &str =
    "id, invoice_no, customer_id, quote_batch_id, issue_date, status, memo, created_at";

const LINE_COLUMNS: &str =
    "id, invoice_id, product_id, qty, suggested_price, manual_price, final_price, created_at";

/// Invoice service for drafting, issuing and cancelling sales invoices
#[derive(Clone)]
pub struct InvoiceService {
    db: PgPool,
    number_prefix: String,
}

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_no: String,
    customer_id: Uuid,
    quote_batch_id: Option<Uuid>,
    issue_date: NaiveDate,
    status: String,
    memo: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for SalesInvoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = InvoiceStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("unknown invoice status '{}'", row.status))
        })?;

        Ok(SalesInvoice {
            id: row.id,
            invoice_no: row.invoice_no,
            customer_id: row.customer_id,
            quote_batch_id: row.quote_batch_id,
            issue_date: row.issue_date,
            status,
            memo: row.memo,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InvoiceLineRow {
    id: Uuid,
    invoice_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
    suggested_price: Option<Decimal>,
    manual_price: Option<Decimal>,
    final_price: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<InvoiceLineRow> for SalesInvoiceLine {
    fn from(row: InvoiceLineRow) -> Self {
        SalesInvoiceLine {
            id: row.id,
            invoice_id: row.invoice_id,
            product_id: row.product_id,
            qty: row.qty,
            suggested_price: row.suggested_price,
            manual_price: row.manual_price,
            final_price: row.final_price,
            created_at: row.created_at,
        }
    }
}

/// Invoice header with its lines and total
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: SalesInvoice,
    pub lines: Vec<SalesInvoiceLine>,
    pub total_php: Decimal,
}

impl InvoiceDetail {
    fn new(invoice: SalesInvoice, lines: Vec<SalesInvoiceLine>) -> AppResult<Self> {
        let total_php = invoice_total(&lines)?;
        Ok(Self {
            invoice,
            lines,
            total_php,
        })
    }
}

/// Replacement values for a draft line
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInvoiceLineInput {
    pub qty: Decimal,
    pub manual_price: Option<Decimal>,
}

/// Filter for invoice listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
}

impl InvoiceService {
    /// Create a new InvoiceService instance
    pub fn new(db: PgPool, number_prefix: impl Into<String>) -> Self {
        Self {
            db,
            number_prefix: number_prefix.into(),
        }
    }

    // ========================================================================
    // Drafting
    // ========================================================================

    /// Create a DRAFT invoice with an optional first set of lines
    pub async fn create_invoice_draft(&self, input: CreateInvoiceInput) -> AppResult<InvoiceDetail> {
        for line in &input.lines {
            validate_line(line.qty, line.manual_price)?;
        }

        let mut tx = self.db.begin().await?;

        fetch_partner(&mut tx, input.customer_id, PartnerType::Customer).await?;
        if let Some(batch_id) = input.quote_batch_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM quote_batches WHERE id = $1)",
            )
            .bind(batch_id)
            .fetch_one(&mut *tx)
            .await?;

            if !exists {
                return Err(CoreError::not_found("quote batch", batch_id).into());
            }
        }

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let invoice_no = self.next_invoice_number(&mut tx, issue_date.year()).await?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            INSERT INTO sales_invoices (invoice_no, customer_id, quote_batch_id, issue_date, status, memo)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(&invoice_no)
        .bind(input.customer_id)
        .bind(input.quote_batch_id)
        .bind(issue_date)
        .bind(InvoiceStatus::Draft.as_str())
        .bind(input.memo.as_deref().unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;

        let invoice = SalesInvoice::try_from(row)?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            lines.push(insert_line(&mut tx, &invoice, line).await?);
        }

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_no = %invoice.invoice_no,
            lines = lines.len(),
            "Invoice draft created"
        );

        InvoiceDetail::new(invoice, lines)
    }

    /// Add a line to a draft
    pub async fn add_line(
        &self,
        invoice_id: Uuid,
        input: InvoiceLineInput,
    ) -> AppResult<SalesInvoiceLine> {
        validate_line(input.qty, input.manual_price)?;

        let mut tx = self.db.begin().await?;
        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        invoice.status.ensure_editable("add lines to")?;

        let line = insert_line(&mut tx, &invoice, &input).await?;
        tx.commit().await?;

        Ok(line)
    }

    /// Replace the qty and manual price of a draft line
    pub async fn update_line(
        &self,
        invoice_id: Uuid,
        line_id: Uuid,
        input: UpdateInvoiceLineInput,
    ) -> AppResult<SalesInvoiceLine> {
        validate_line(input.qty, input.manual_price)?;

        let mut tx = self.db.begin().await?;
        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        invoice.status.ensure_editable("edit lines of")?;

        let row = sqlx::query_as::<_, InvoiceLineRow>(&format!(
            r#"
            UPDATE sales_invoice_lines
            SET qty = $3, manual_price = $4
            WHERE id = $1 AND invoice_id = $2
            RETURNING {}
            "#,
            LINE_COLUMNS
        ))
        .bind(line_id)
        .bind(invoice_id)
        .bind(input.qty)
        .bind(input.manual_price)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::not_found("invoice line", line_id))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Remove a line from a draft
    pub async fn remove_line(&self, invoice_id: Uuid, line_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        invoice.status.ensure_editable("remove lines from")?;

        let result = sqlx::query("DELETE FROM sales_invoice_lines WHERE id = $1 AND invoice_id = $2")
            .bind(line_id)
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("invoice line", line_id).into());
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a draft with its lines. Issued and cancelled invoices stay.
    pub async fn delete_draft(&self, invoice_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        invoice.status.ensure_editable("delete")?;

        sqlx::query("DELETE FROM sales_invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(invoice_no = %invoice.invoice_no, "Invoice draft deleted");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get an invoice with its lines
    pub async fn get_invoice(&self, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM sales_invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CoreError::not_found("invoice", invoice_id))?;

        let invoice = SalesInvoice::try_from(row)?;
        let mut conn = self.db.acquire().await?;
        let lines = fetch_lines(&mut conn, invoice_id, false).await?;

        InvoiceDetail::new(invoice, lines)
    }

    /// Invoice headers, newest first
    pub async fn list_invoices(&self, filter: InvoiceFilter) -> AppResult<Vec<SalesInvoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {}
            FROM sales_invoices
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR customer_id = $2)
            ORDER BY issue_date DESC, invoice_no DESC
            "#,
            INVOICE_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(SalesInvoice::try_from).collect()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Issue a draft: fix line prices, deduct stock, mark ISSUED.
    ///
    /// Issuing an invoice that is already ISSUED or CANCELLED returns it
    /// unchanged.
    pub async fn issue_invoice(&self, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;
        let reference = MovementRef::Invoice { id: invoice.id };

        let has_out = if invoice.status == InvoiceStatus::Draft {
            ledger::has_movement(&mut tx, MovementType::Out, &reference).await?
        } else {
            false
        };

        match check_issue(invoice.id, invoice.status, has_out) {
            Ok(IssueDecision::Proceed) => {}
            Ok(IssueDecision::AlreadyFinal(status)) => {
                tracing::warn!(
                    invoice_no = %invoice.invoice_no,
                    %status,
                    "Issue ignored, invoice already final"
                );
                let lines = fetch_lines(&mut tx, invoice.id, false).await?;
                tx.commit().await?;
                return InvoiceDetail::new(invoice, lines);
            }
            Err(err) => {
                tracing::warn!(invoice_no = %invoice.invoice_no, "Issue blocked: {}", err);
                return Err(err.into());
            }
        }

        let mut lines = fetch_lines(&mut tx, invoice.id, true).await?;

        let suggestions = quote_suggestions(&mut tx, &invoice, &lines).await?;
        lock_line_prices(&mut lines, |product_id| suggestions.get(&product_id).copied())?;
        for line in &lines {
            sqlx::query(
                "UPDATE sales_invoice_lines SET suggested_price = $2, final_price = $3 WHERE id = $1",
            )
            .bind(line.id)
            .bind(line.suggested_price)
            .bind(line.final_price)
            .execute(&mut *tx)
            .await?;
        }

        let now = Utc::now();
        let mut balances = ledger::lock_balances(&mut tx, &lock_order(&lines)).await?;
        let drafts = apply_issue(&invoice, &lines, &mut balances, now)?;
        let movements = ledger::record(&mut tx, &balances, &drafts, now).await?;

        set_status(&mut tx, invoice.id, InvoiceStatus::Issued).await?;
        invoice.status = InvoiceStatus::Issued;
        let detail = InvoiceDetail::new(invoice, lines)?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %detail.invoice.id,
            invoice_no = %detail.invoice.invoice_no,
            movements = movements.len(),
            total = %detail.total_php,
            "Invoice issued"
        );

        Ok(detail)
    }

    /// Cancel an issued invoice and put its stock back.
    ///
    /// The OUT movements stay in the journal; compensating IN movements are
    /// appended and the average cost is not touched.
    pub async fn cancel_invoice(&self, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;
        let reference = MovementRef::Invoice { id: invoice.id };

        let has_in = if invoice.status == InvoiceStatus::Issued {
            ledger::has_movement(&mut tx, MovementType::In, &reference).await?
        } else {
            false
        };

        if let Err(err) = check_cancel(invoice.id, invoice.status, has_in) {
            tracing::warn!(invoice_no = %invoice.invoice_no, "Cancel refused: {}", err);
            return Err(err.into());
        }

        let lines = fetch_lines(&mut tx, invoice.id, true).await?;

        let now = Utc::now();
        let mut balances = ledger::lock_balances(&mut tx, &lock_order(&lines)).await?;
        let drafts = apply_cancel(&invoice, &lines, &mut balances, now)?;
        let movements = ledger::record(&mut tx, &balances, &drafts, now).await?;

        set_status(&mut tx, invoice.id, InvoiceStatus::Cancelled).await?;
        tx.commit().await?;
        invoice.status = InvoiceStatus::Cancelled;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_no = %invoice.invoice_no,
            movements = movements.len(),
            "Invoice cancelled"
        );

        InvoiceDetail::new(invoice, lines)
    }

    /// Next PREFIX-YYYY-NNNN number. Serialised per prefix and year with an
    /// advisory lock held until the transaction ends.
    async fn next_invoice_number(&self, conn: &mut PgConnection, year: i32) -> AppResult<String> {
        let stem = format!("{}-{}-", self.number_prefix, year);

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&stem)
            .execute(&mut *conn)
            .await?;

        let last = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(CAST(SUBSTRING(invoice_no FROM $2) AS BIGINT))
            FROM sales_invoices
            WHERE invoice_no LIKE $1 || '%'
              AND SUBSTRING(invoice_no FROM $2) ~ '^[0-9]+$'
            "#,
        )
        .bind(&stem)
        .bind(stem.chars().count() as i32 + 1)
        .fetch_one(&mut *conn)
        .await?;

        Ok(generate_invoice_number(
            &self.number_prefix,
            year,
            last.unwrap_or(0) + 1,
        ))
    }
}

fn validate_line(qty: Decimal, manual_price: Option<Decimal>) -> AppResult<()> {
    ensure_positive("qty", qty)?;
    if let Some(price) = manual_price {
        validate_price(price).map_err(|e| AppError::validation("manual_price", e))?;
    }
    Ok(())
}

async fn lock_invoice(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<SalesInvoice> {
    let row = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {} FROM sales_invoices WHERE id = $1 FOR UPDATE",
        INVOICE_COLUMNS
    ))
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("invoice", invoice_id))?;

    row.try_into()
}

async fn fetch_lines(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    for_update: bool,
) -> AppResult<Vec<SalesInvoiceLine>> {
    let sql = format!(
        "SELECT {} FROM sales_invoice_lines WHERE invoice_id = $1 ORDER BY created_at, id{}",
        LINE_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );

    let rows = sqlx::query_as::<_, InvoiceLineRow>(&sql)
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(SalesInvoiceLine::from).collect())
}

async fn insert_line(
    conn: &mut PgConnection,
    invoice: &SalesInvoice,
    input: &InvoiceLineInput,
) -> AppResult<SalesInvoiceLine> {
    fetch_active_product(conn, input.product_id, "sell").await?;

    let suggested_price = match invoice.quote_batch_id {
        Some(batch_id) => latest_line_for(conn, batch_id, input.product_id)
            .await?
            .map(|line| line.final_price),
        None => None,
    };

    let row = sqlx::query_as::<_, InvoiceLineRow>(&format!(
        r#"
        INSERT INTO sales_invoice_lines (invoice_id, product_id, qty, suggested_price, manual_price)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        LINE_COLUMNS
    ))
    .bind(invoice.id)
    .bind(input.product_id)
    .bind(input.qty)
    .bind(suggested_price)
    .bind(input.manual_price)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Latest quote price per product for lines that still lack a suggestion
async fn quote_suggestions(
    conn: &mut PgConnection,
    invoice: &SalesInvoice,
    lines: &[SalesInvoiceLine],
) -> AppResult<HashMap<Uuid, Decimal>> {
    let mut suggestions = HashMap::new();
    let Some(batch_id) = invoice.quote_batch_id else {
        return Ok(suggestions);
    };

    for line in lines.iter().filter(|l| l.suggested_price.is_none()) {
        if suggestions.contains_key(&line.product_id) {
            continue;
        }
        if let Some(quote) = latest_line_for(conn, batch_id, line.product_id).await? {
            suggestions.insert(line.product_id, quote.final_price);
        }
    }
    Ok(suggestions)
}

async fn set_status(conn: &mut PgConnection, invoice_id: Uuid, status: InvoiceStatus) -> AppResult<()> {
    sqlx::query("UPDATE sales_invoices SET status = $2 WHERE id = $1")
        .bind(invoice_id)
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}
