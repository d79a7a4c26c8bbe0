//! Read-only reports over balances and issued invoices
//!
//! Reports read committed state without taking locks; slightly stale figures
//! are acceptable here.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{checked, CoreResult, DateRange, InvoiceStatus, Partner, PartnerType};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{BalanceView, InventoryLedger};
use crate::services::product::fetch_partner;

/// Most invoices listed on a customer detail report
const CUSTOMER_INVOICE_LIMIT: i64 = 500;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Stock valuation at moving-average cost
#[derive(Debug, Serialize)]
pub struct InventoryValuationReport {
    pub lines: Vec<BalanceView>,
    pub product_count: usize,
    pub total_value: Decimal,
}

impl InventoryValuationReport {
    pub fn from_balances(lines: Vec<BalanceView>) -> CoreResult<Self> {
        let total_value = lines.iter().try_fold(Decimal::ZERO, |total, l| {
            checked(total.checked_add(l.inventory_value), "valuation total")
        })?;
        Ok(Self {
            product_count: lines.len(),
            lines,
            total_value,
        })
    }
}

/// Issued sales per customer
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerSales {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub invoice_count: i64,
    pub total_php: Decimal,
}

/// Highest total first, ties broken by customer name
pub fn rank_customer_sales(rows: &mut [CustomerSales]) {
    rows.sort_by(|a, b| match b.total_php.cmp(&a.total_php) {
        Ordering::Equal => a.customer_name.cmp(&b.customer_name),
        other => other,
    });
}

/// Issued sales of one product, as aggregated by the database
#[derive(Debug, Clone, FromRow)]
struct ProductSalesRow {
    product_id: Uuid,
    sku_code: String,
    name_en: String,
    name_ko: String,
    qty_sold: Decimal,
    sales_php: Decimal,
    invoice_count: i64,
}

/// Issued sales of one product with its average selling price
#[derive(Debug, Clone, Serialize)]
pub struct ProductPerformance {
    pub product_id: Uuid,
    pub sku_code: String,
    pub name_en: String,
    pub name_ko: String,
    pub qty_sold: Decimal,
    pub sales_php: Decimal,
    pub invoice_count: i64,
    /// `sales_php / qty_sold`, zero when nothing was sold
    pub avg_unit_price: Decimal,
}

impl TryFrom<ProductSalesRow> for ProductPerformance {
    type Error = AppError;

    fn try_from(row: ProductSalesRow) -> Result<Self, Self::Error> {
        let avg_unit_price = if row.qty_sold > Decimal::ZERO {
            checked(row.sales_php.checked_div(row.qty_sold), "average unit price")?
        } else {
            Decimal::ZERO
        };

        Ok(ProductPerformance {
            product_id: row.product_id,
            sku_code: row.sku_code,
            name_en: row.name_en,
            name_ko: row.name_ko,
            qty_sold: row.qty_sold,
            sales_php: row.sales_php,
            invoice_count: row.invoice_count,
            avg_unit_price,
        })
    }
}

/// Highest sales first, then highest qty, then SKU
pub fn rank_product_performance(rows: &mut [ProductPerformance]) {
    rows.sort_by(|a, b| {
        b.sales_php
            .cmp(&a.sales_php)
            .then_with(|| b.qty_sold.cmp(&a.qty_sold))
            .then_with(|| a.sku_code.cmp(&b.sku_code))
    });
}

/// What one customer bought of one product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerProductSales {
    pub product_id: Uuid,
    pub sku_code: String,
    pub name_en: String,
    pub name_ko: String,
    pub total_qty: Decimal,
    pub total_php: Decimal,
}

/// An issued invoice as listed on the customer report
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IssuedInvoiceSummary {
    pub invoice_id: Uuid,
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub total_php: Decimal,
}

/// Purchases of one customer over ISSUED invoices
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetailReport {
    pub customer: Partner,
    pub range: DateRange,
    /// Per SKU, ordered by SKU code
    pub products: Vec<CustomerProductSales>,
    /// Newest first
    pub invoices: Vec<IssuedInvoiceSummary>,
    pub total_php: Decimal,
}

impl CustomerDetailReport {
    pub fn new(
        customer: Partner,
        range: DateRange,
        products: Vec<CustomerProductSales>,
        invoices: Vec<IssuedInvoiceSummary>,
    ) -> CoreResult<Self> {
        let total_php = products.iter().try_fold(Decimal::ZERO, |total, p| {
            checked(total.checked_add(p.total_php), "customer total")
        })?;
        Ok(Self {
            customer,
            range,
            products,
            invoices,
            total_php,
        })
    }
}

fn ensure_ordered(range: &DateRange) -> AppResult<()> {
    if range.is_reversed() {
        return Err(AppError::validation("end", "End date is before start date"));
    }
    Ok(())
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Per-product quantity, average cost and value with a grand total
    pub async fn inventory_valuation(&self) -> AppResult<InventoryValuationReport> {
        let balances = InventoryLedger::new(self.db.clone()).list_balances().await?;
        Ok(InventoryValuationReport::from_balances(balances)?)
    }

    /// Sales by customer over ISSUED invoices, optionally within a date range.
    /// Cancelled invoices do not count.
    pub async fn sales_by_customer(&self, range: &DateRange) -> AppResult<Vec<CustomerSales>> {
        ensure_ordered(range)?;

        let mut rows = sqlx::query_as::<_, CustomerSales>(
            r#"
            SELECT
                c.id AS customer_id,
                c.name AS customer_name,
                COUNT(DISTINCT i.id) AS invoice_count,
                COALESCE(SUM(l.final_price * l.qty), 0) AS total_php
            FROM sales_invoices i
            JOIN partners c ON c.id = i.customer_id
            LEFT JOIN sales_invoice_lines l ON l.invoice_id = i.id
            WHERE i.status = $1
              AND ($2::date IS NULL OR i.issue_date >= $2)
              AND ($3::date IS NULL OR i.issue_date <= $3)
            GROUP BY c.id, c.name
            "#,
        )
        .bind(InvoiceStatus::Issued.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        rank_customer_sales(&mut rows);
        Ok(rows)
    }

    /// Quantity, sales, invoice count and average price per product over
    /// ISSUED invoices in the range
    pub async fn product_performance(&self, range: &DateRange) -> AppResult<Vec<ProductPerformance>> {
        ensure_ordered(range)?;

        let rows = sqlx::query_as::<_, ProductSalesRow>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku_code,
                p.name_en,
                p.name_ko,
                COALESCE(SUM(l.qty), 0) AS qty_sold,
                COALESCE(SUM(COALESCE(l.final_price, 0) * l.qty), 0) AS sales_php,
                COUNT(DISTINCT l.invoice_id) AS invoice_count
            FROM sales_invoice_lines l
            JOIN sales_invoices i ON i.id = l.invoice_id
            JOIN products p ON p.id = l.product_id
            WHERE i.status = $1
              AND ($2::date IS NULL OR i.issue_date >= $2)
              AND ($3::date IS NULL OR i.issue_date <= $3)
            GROUP BY p.id, p.sku_code, p.name_en, p.name_ko
            "#,
        )
        .bind(InvoiceStatus::Issued.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        let mut report = rows
            .into_iter()
            .map(ProductPerformance::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        rank_product_performance(&mut report);
        Ok(report)
    }

    /// Per-SKU purchases and the issued invoices of one customer
    pub async fn customer_detail(
        &self,
        customer_id: Uuid,
        range: &DateRange,
    ) -> AppResult<CustomerDetailReport> {
        ensure_ordered(range)?;

        let mut conn = self.db.acquire().await?;
        let customer = fetch_partner(&mut conn, customer_id, PartnerType::Customer).await?;

        let products = sqlx::query_as::<_, CustomerProductSales>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku_code,
                p.name_en,
                p.name_ko,
                COALESCE(SUM(l.qty), 0) AS total_qty,
                COALESCE(SUM(COALESCE(l.final_price, 0) * l.qty), 0) AS total_php
            FROM sales_invoice_lines l
            JOIN sales_invoices i ON i.id = l.invoice_id
            JOIN products p ON p.id = l.product_id
            WHERE i.status = $1
              AND i.customer_id = $2
              AND ($3::date IS NULL OR i.issue_date >= $3)
              AND ($4::date IS NULL OR i.issue_date <= $4)
            GROUP BY p.id, p.sku_code, p.name_en, p.name_ko
            ORDER BY p.sku_code
            "#,
        )
        .bind(InvoiceStatus::Issued.as_str())
        .bind(customer_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&mut *conn)
        .await?;

        let invoices = sqlx::query_as::<_, IssuedInvoiceSummary>(
            r#"
            SELECT
                i.id AS invoice_id,
                i.invoice_no,
                i.issue_date,
                COALESCE(SUM(COALESCE(l.final_price, 0) * l.qty), 0) AS total_php
            FROM sales_invoices i
            LEFT JOIN sales_invoice_lines l ON l.invoice_id = i.id
            WHERE i.status = $1
              AND i.customer_id = $2
              AND ($3::date IS NULL OR i.issue_date >= $3)
              AND ($4::date IS NULL OR i.issue_date <= $4)
            GROUP BY i.id, i.invoice_no, i.issue_date
            ORDER BY i.issue_date DESC, i.invoice_no DESC
            LIMIT $5
            "#,
        )
        .bind(InvoiceStatus::Issued.as_str())
        .bind(customer_id)
        .bind(range.start)
        .bind(range.end)
        .bind(CUSTOMER_INVOICE_LIMIT)
        .fetch_all(&mut *conn)
        .await?;

        Ok(CustomerDetailReport::new(
            customer,
            range.clone(),
            products,
            invoices,
        )?)
    }
}
