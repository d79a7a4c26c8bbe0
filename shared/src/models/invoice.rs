//! Sales invoices: status machine, price resolution and stock effects

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{checked, CoreError, CoreResult};
use crate::models::inventory::{Balance, MovementDraft, MovementRef};

/// Invoice status. DRAFT → ISSUED → CANCELLED, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(InvoiceStatus::Draft),
            "ISSUED" => Some(InvoiceStatus::Issued),
            "CANCELLED" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Draft rows are the only ones whose lines may change
    pub fn ensure_editable(&self, action: &'static str) -> CoreResult<()> {
        if *self != InvoiceStatus::Draft {
            return Err(self.transition_error(action));
        }
        Ok(())
    }

    fn transition_error(&self, action: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            entity: "invoice",
            from: self.as_str().to_string(),
            action,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the issue pre-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueDecision {
    /// Draft with a clean journal; go ahead
    Proceed,
    /// Already issued or cancelled; return the invoice unchanged
    AlreadyFinal(InvoiceStatus),
}

/// Decide whether an issue request should run.
///
/// Re-issuing is a no-op. A draft that already has OUT movements is a
/// half-applied earlier attempt and is refused rather than repaired.
pub fn check_issue(
    invoice_id: Uuid,
    status: InvoiceStatus,
    has_out_movements: bool,
) -> CoreResult<IssueDecision> {
    if status != InvoiceStatus::Draft {
        return Ok(IssueDecision::AlreadyFinal(status));
    }
    if has_out_movements {
        return Err(CoreError::CorruptState {
            invoice_id,
            detail: "draft invoice already has OUT movements; issue blocked to prevent double deduction"
                .to_string(),
        });
    }
    Ok(IssueDecision::Proceed)
}

/// Only issued invoices can be cancelled, and only once
pub fn check_cancel(invoice_id: Uuid, status: InvoiceStatus, has_in_movements: bool) -> CoreResult<()> {
    if status != InvoiceStatus::Issued {
        return Err(status.transition_error("cancel"));
    }
    if has_in_movements {
        return Err(CoreError::CorruptState {
            invoice_id,
            detail: "issued invoice already has restoring IN movements; cancel blocked to prevent double restore"
                .to_string(),
        });
    }
    Ok(())
}

/// Sales invoice header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesInvoice {
    pub id: Uuid,
    pub invoice_no: String,
    pub customer_id: Uuid,
    pub quote_batch_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub status: InvoiceStatus,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

/// One invoice line. `final_price` is fixed at issue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesInvoiceLine {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub qty: Decimal,
    pub suggested_price: Option<Decimal>,
    pub manual_price: Option<Decimal>,
    pub final_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl SalesInvoiceLine {
    /// Manual override wins over the suggestion
    pub fn resolved_price(&self) -> Option<Decimal> {
        self.manual_price.or(self.suggested_price)
    }

    pub fn line_total(&self) -> CoreResult<Decimal> {
        match self.final_price {
            Some(price) => checked(price.checked_mul(self.qty), "line total"),
            None => Ok(Decimal::ZERO),
        }
    }
}

/// Invoice total; lines without a final price count as zero
pub fn invoice_total(lines: &[SalesInvoiceLine]) -> CoreResult<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        checked(total.checked_add(line.line_total()?), "invoice total")
    })
}

/// Invoice number: PREFIX-YYYY-NNNN
pub fn generate_invoice_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, sequence)
}

/// Fix the final price of every line, pulling a suggestion when missing.
///
/// `suggest` returns the latest quote price for a product, if any.
pub fn lock_line_prices<F>(lines: &mut [SalesInvoiceLine], mut suggest: F) -> CoreResult<()>
where
    F: FnMut(Uuid) -> Option<Decimal>,
{
    for line in lines.iter_mut() {
        if line.suggested_price.is_none() {
            line.suggested_price = suggest(line.product_id);
        }
        line.final_price = line.resolved_price();
        if line.final_price.is_none() {
            return Err(CoreError::MissingPrice {
                product_id: line.product_id,
            });
        }
    }
    Ok(())
}

/// Products touched by the lines, ascending. Balance rows are locked in
/// this order so invoices over overlapping products cannot deadlock.
pub fn lock_order(lines: &[SalesInvoiceLine]) -> Vec<Uuid> {
    lines
        .iter()
        .map(|l| l.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Deduct stock for every line with a positive qty.
///
/// All-or-nothing: `balances` is only updated when every line succeeds.
/// A missing balance row counts as zero stock. An invoice without lines
/// cannot be issued.
pub fn apply_issue(
    invoice: &SalesInvoice,
    lines: &[SalesInvoiceLine],
    balances: &mut BTreeMap<Uuid, Balance>,
    now: DateTime<Utc>,
) -> CoreResult<Vec<MovementDraft>> {
    if lines.is_empty() {
        return Err(CoreError::InvalidTransition {
            entity: "invoice",
            from: "DRAFT without lines".to_string(),
            action: "issue",
        });
    }

    let mut working = balances.clone();
    let mut drafts = Vec::with_capacity(lines.len());
    let memo = format!("Invoice {} issued", invoice.invoice_no);

    for line in lines.iter().filter(|l| l.qty > Decimal::ZERO) {
        let balance = working
            .entry(line.product_id)
            .or_insert_with(|| Balance::empty(line.product_id, now));
        drafts.push(balance.apply_out(
            line.qty,
            MovementRef::Invoice { id: invoice.id },
            memo.clone(),
            now,
        )?);
    }

    *balances = working;
    Ok(drafts)
}

/// Return stock for every line with a positive qty, leaving averages alone
pub fn apply_cancel(
    invoice: &SalesInvoice,
    lines: &[SalesInvoiceLine],
    balances: &mut BTreeMap<Uuid, Balance>,
    now: DateTime<Utc>,
) -> CoreResult<Vec<MovementDraft>> {
    let mut working = balances.clone();
    let mut drafts = Vec::with_capacity(lines.len());
    let memo = format!("Invoice {} cancelled", invoice.invoice_no);

    for line in lines.iter().filter(|l| l.qty > Decimal::ZERO) {
        let balance = working
            .entry(line.product_id)
            .or_insert_with(|| Balance::empty(line.product_id, now));
        drafts.push(balance.apply_restore(
            line.qty,
            MovementRef::Invoice { id: invoice.id },
            memo.clone(),
            now,
        )?);
    }

    *balances = working;
    Ok(drafts)
}

/// Input for one draft line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineInput {
    pub product_id: Uuid,
    pub qty: Decimal,
    pub manual_price: Option<Decimal>,
}

/// Input for creating a draft invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceInput {
    pub customer_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    pub quote_batch_id: Option<Uuid>,
    pub memo: Option<String>,
    #[serde(default)]
    pub lines: Vec<InvoiceLineInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::{MovementType, TransactionDirection};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn invoice() -> SalesInvoice {
        SalesInvoice {
            id: Uuid::new_v4(),
            invoice_no: "INV-2026-0001".to_string(),
            customer_id: Uuid::new_v4(),
            quote_batch_id: None,
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            status: InvoiceStatus::Draft,
            memo: String::new(),
            created_at: Utc::now(),
        }
    }

    fn line(invoice_id: Uuid, product_id: Uuid, qty: &str) -> SalesInvoiceLine {
        SalesInvoiceLine {
            id: Uuid::new_v4(),
            invoice_id,
            product_id,
            qty: dec(qty),
            suggested_price: None,
            manual_price: None,
            final_price: None,
            created_at: Utc::now(),
        }
    }

    fn stocked(product_id: Uuid, qty: &str, avg: &str) -> Balance {
        Balance {
            product_id,
            on_hand_qty: dec(qty),
            avg_unit_cost: dec(avg),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_decision() {
        let id = Uuid::new_v4();
        assert_eq!(
            check_issue(id, InvoiceStatus::Draft, false).unwrap(),
            IssueDecision::Proceed
        );
        assert_eq!(
            check_issue(id, InvoiceStatus::Issued, true).unwrap(),
            IssueDecision::AlreadyFinal(InvoiceStatus::Issued)
        );
        assert_eq!(
            check_issue(id, InvoiceStatus::Cancelled, false).unwrap(),
            IssueDecision::AlreadyFinal(InvoiceStatus::Cancelled)
        );
        assert!(matches!(
            check_issue(id, InvoiceStatus::Draft, true),
            Err(CoreError::CorruptState { .. })
        ));
    }

    #[test]
    fn test_cancel_rules() {
        let id = Uuid::new_v4();
        assert!(check_cancel(id, InvoiceStatus::Issued, false).is_ok());
        assert!(matches!(
            check_cancel(id, InvoiceStatus::Draft, false),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            check_cancel(id, InvoiceStatus::Cancelled, false),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            check_cancel(id, InvoiceStatus::Issued, true),
            Err(CoreError::CorruptState { .. })
        ));
    }

    #[test]
    fn test_editable_only_in_draft() {
        assert!(InvoiceStatus::Draft.ensure_editable("edit").is_ok());
        assert!(InvoiceStatus::Issued.ensure_editable("edit").is_err());
        assert!(InvoiceStatus::Cancelled.ensure_editable("delete").is_err());
    }

    #[test]
    fn test_price_resolution() {
        let inv = invoice();
        let with_manual = Uuid::new_v4();
        let quoted = Uuid::new_v4();

        let mut lines = vec![line(inv.id, with_manual, "1"), line(inv.id, quoted, "2")];
        lines[0].manual_price = Some(dec("1800"));
        lines[0].suggested_price = Some(dec("1750"));

        lock_line_prices(&mut lines, |p| (p == quoted).then(|| dec("920"))).unwrap();
        assert_eq!(lines[0].final_price, Some(dec("1800")));
        assert_eq!(lines[1].suggested_price, Some(dec("920")));
        assert_eq!(lines[1].final_price, Some(dec("920")));
        assert_eq!(invoice_total(&lines).unwrap(), dec("3640"));
    }

    #[test]
    fn test_missing_price_names_product() {
        let inv = invoice();
        let product = Uuid::new_v4();
        let mut lines = vec![line(inv.id, product, "1")];
        let err = lock_line_prices(&mut lines, |_| None).unwrap_err();
        assert_eq!(err, CoreError::MissingPrice { product_id: product });
    }

    #[test]
    fn test_invoice_without_lines_cannot_be_issued() {
        let inv = invoice();
        let mut balances = BTreeMap::new();
        let err = apply_issue(&inv, &[], &mut balances, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(balances.is_empty());
    }

    #[test]
    fn test_issue_then_cancel_restores_stock() {
        let inv = invoice();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut balances = BTreeMap::from([
            (a, stocked(a, "15", "120")),
            (b, stocked(b, "4", "55.5")),
        ]);
        let before = balances.clone();
        let lines = vec![line(inv.id, a, "5"), line(inv.id, b, "4"), line(inv.id, a, "2")];

        let out = apply_issue(&inv, &lines, &mut balances, Utc::now()).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|m| m.movement_type == MovementType::Out));
        assert_eq!(balances[&a].on_hand_qty, dec("8"));
        assert_eq!(balances[&b].on_hand_qty, Decimal::ZERO);

        let back = apply_cancel(&inv, &lines, &mut balances, Utc::now()).unwrap();
        assert!(back
            .iter()
            .all(|m| m.movement_type == MovementType::In && m.direction == TransactionDirection::In));
        for (id, original) in &before {
            assert_eq!(balances[id].on_hand_qty, original.on_hand_qty);
            assert_eq!(balances[id].avg_unit_cost, original.avg_unit_cost);
        }
    }

    #[test]
    fn test_issue_is_all_or_nothing() {
        let inv = invoice();
        let a = Uuid::new_v4();
        let short = Uuid::new_v4();
        let mut balances = BTreeMap::from([
            (a, stocked(a, "10", "100")),
            (short, stocked(short, "3", "100")),
        ]);
        let before = balances.clone();
        let lines = vec![line(inv.id, a, "5"), line(inv.id, short, "5")];

        let err = apply_issue(&inv, &lines, &mut balances, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { product_id, .. } if product_id == short));
        assert_eq!(balances, before);
    }

    #[test]
    fn test_zero_qty_lines_skipped() {
        let inv = invoice();
        let a = Uuid::new_v4();
        let mut balances = BTreeMap::new();
        let lines = vec![line(inv.id, a, "0")];
        let out = apply_issue(&inv, &lines, &mut balances, Utc::now()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_lock_order_is_sorted_and_unique() {
        let inv = invoice();
        let mut ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let lines: Vec<_> = ids
            .iter()
            .chain(ids.iter())
            .map(|p| line(inv.id, *p, "1"))
            .collect();
        ids.sort();
        assert_eq!(lock_order(&lines), ids);
    }

    #[test]
    fn test_invoice_number_format() {
        assert_eq!(generate_invoice_number("INV", 2026, 7), "INV-2026-0007");
        assert_eq!(generate_invoice_number("SI", 2026, 12345), "SI-2026-12345");
    }
}
