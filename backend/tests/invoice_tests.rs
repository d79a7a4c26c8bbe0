//! Sales invoice tests
//!
//! Properties of the invoice state machine and its stock effects:
//! - Issue then cancel restores every balance exactly
//! - A failed issue leaves every balance unchanged
//! - Re-issuing is a no-op; the journal guards block double deduction
//! - Balance locks are taken in one global order

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    apply_cancel, apply_issue, check_cancel, check_issue, invoice_total, lock_line_prices,
    lock_order, Balance, CoreError, InvoiceStatus, IssueDecision, MovementRef, MovementType,
    SalesInvoice, SalesInvoiceLine,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn draft_invoice() -> SalesInvoice {
    SalesInvoice {
        id: Uuid::new_v4(),
        invoice_no: "INV-2026-0042".to_string(),
        customer_id: Uuid::new_v4(),
        quote_batch_id: None,
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        status: InvoiceStatus::Draft,
        memo: String::new(),
        created_at: Utc::now(),
    }
}

fn product(n: usize) -> Uuid {
    Uuid::from_u128(n as u128 + 1)
}

fn line(invoice: &SalesInvoice, product_id: Uuid, qty: Decimal) -> SalesInvoiceLine {
    SalesInvoiceLine {
        id: Uuid::new_v4(),
        invoice_id: invoice.id,
        product_id,
        qty,
        suggested_price: None,
        manual_price: None,
        final_price: None,
        created_at: Utc::now(),
    }
}

fn balance(product_id: Uuid, qty: Decimal, avg: Decimal) -> Balance {
    Balance {
        product_id,
        on_hand_qty: qty,
        avg_unit_cost: avg,
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Stock received at 591.3, sold at the quoted 920, then cancelled
    #[test]
    fn test_receive_sell_cancel_flow() {
        let invoice = draft_invoice();
        let p = product(0);
        let mut balances = BTreeMap::from([(p, balance(p, dec("10"), dec("591.3")))]);

        let mut lines = vec![line(&invoice, p, dec("4"))];
        lock_line_prices(&mut lines, |_| Some(dec("920"))).unwrap();
        assert_eq!(invoice_total(&lines).unwrap(), dec("3680"));

        let out = apply_issue(&invoice, &lines, &mut balances, Utc::now()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reference, MovementRef::Invoice { id: invoice.id });
        assert_eq!(out[0].memo, "Invoice INV-2026-0042 issued");
        assert_eq!(balances[&p].on_hand_qty, dec("6"));

        check_cancel(invoice.id, InvoiceStatus::Issued, false).unwrap();
        let back = apply_cancel(&invoice, &lines, &mut balances, Utc::now()).unwrap();
        assert_eq!(back[0].movement_type, MovementType::In);
        assert_eq!(back[0].memo, "Invoice INV-2026-0042 cancelled");
        assert_eq!(balances[&p].on_hand_qty, dec("10"));
        assert_eq!(balances[&p].avg_unit_cost, dec("591.3"));
    }

    /// Product never received has no balance row; issuing fails cleanly
    #[test]
    fn test_issue_without_balance_row() {
        let invoice = draft_invoice();
        let p = product(7);
        let mut balances = BTreeMap::new();
        let lines = vec![line(&invoice, p, dec("1"))];

        let err = apply_issue(&invoice, &lines, &mut balances, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_id: p,
                on_hand: Decimal::ZERO,
                requested: dec("1"),
            }
        );
        assert!(balances.is_empty());
    }

    /// A draft with no lines stays a draft
    #[test]
    fn test_empty_invoice_not_issued() {
        let invoice = draft_invoice();
        let p = product(1);
        let mut balances = BTreeMap::from([(p, Balance::empty(p, Utc::now()))]);
        let before = balances.clone();

        let err = apply_issue(&invoice, &[], &mut balances, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition { action: "issue", .. }
        ));
        assert_eq!(balances, before);
    }

    /// Half-applied earlier attempts are refused, not repaired
    #[test]
    fn test_journal_guards() {
        let id = Uuid::new_v4();

        let err = check_issue(id, InvoiceStatus::Draft, true).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_STATE");

        let err = check_cancel(id, InvoiceStatus::Issued, true).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_STATE");

        let err = check_cancel(id, InvoiceStatus::Draft, false).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    /// The first unpriced line stops price locking
    #[test]
    fn test_missing_price_stops_issue() {
        let invoice = draft_invoice();
        let priced = product(0);
        let unpriced = product(1);
        let mut lines = vec![line(&invoice, priced, dec("1")), line(&invoice, unpriced, dec("1"))];
        lines[0].manual_price = Some(dec("150"));

        let err = lock_line_prices(&mut lines, |_| None).unwrap_err();
        assert_eq!(err, CoreError::MissingPrice { product_id: unpriced });
        assert_eq!(err.code(), "MISSING_PRICE");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    const PRODUCTS: usize = 4;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 100.0
    }

    fn cost_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 2))
    }

    /// (product index, qty) pairs; products repeat across lines
    fn lines_strategy() -> impl Strategy<Value = Vec<(usize, Decimal)>> {
        prop::collection::vec((0..PRODUCTS, quantity_strategy()), 1..8)
    }

    fn stock_strategy() -> impl Strategy<Value = Vec<(Decimal, Decimal)>> {
        prop::collection::vec(
            ((0i64..=3000i64).prop_map(|n| Decimal::new(n, 1)), cost_strategy()),
            PRODUCTS,
        )
    }

    fn build(
        invoice: &SalesInvoice,
        specs: &[(usize, Decimal)],
        stock: &[(Decimal, Decimal)],
    ) -> (Vec<SalesInvoiceLine>, BTreeMap<Uuid, Balance>) {
        let lines = specs
            .iter()
            .map(|(idx, qty)| line(invoice, product(*idx), *qty))
            .collect();
        let balances = stock
            .iter()
            .enumerate()
            .map(|(idx, (qty, avg))| (product(idx), balance(product(idx), *qty, *avg)))
            .collect();
        (lines, balances)
    }

    fn demand(specs: &[(usize, Decimal)]) -> BTreeMap<Uuid, Decimal> {
        let mut totals = BTreeMap::new();
        for (idx, qty) in specs {
            *totals.entry(product(*idx)).or_insert(Decimal::ZERO) += *qty;
        }
        totals
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Issue either deducts every line or changes nothing; a successful
        /// issue followed by cancel restores qty and average exactly
        #[test]
        fn prop_issue_cancel_round_trip(specs in lines_strategy(), stock in stock_strategy()) {
            let invoice = draft_invoice();
            let (lines, mut balances) = build(&invoice, &specs, &stock);
            let before = balances.clone();
            let needed = demand(&specs);
            let enough = needed.iter().all(|(p, q)| before[p].on_hand_qty >= *q);

            match apply_issue(&invoice, &lines, &mut balances, Utc::now()) {
                Ok(out) => {
                    prop_assert!(enough);
                    prop_assert_eq!(out.len(), lines.len());
                    for (p, q) in &needed {
                        prop_assert_eq!(balances[p].on_hand_qty, before[p].on_hand_qty - *q);
                    }

                    apply_cancel(&invoice, &lines, &mut balances, Utc::now()).unwrap();
                    for (p, original) in &before {
                        prop_assert_eq!(balances[p].on_hand_qty, original.on_hand_qty);
                        prop_assert_eq!(balances[p].avg_unit_cost, original.avg_unit_cost);
                    }
                }
                Err(CoreError::InsufficientStock { product_id, .. }) => {
                    prop_assert!(!enough);
                    prop_assert!(before[&product_id].on_hand_qty < needed[&product_id]);
                    prop_assert_eq!(&balances, &before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        /// Re-issuing an issued or cancelled invoice never runs again,
        /// whatever the journal says
        #[test]
        fn prop_reissue_is_noop(
            status in prop_oneof![Just(InvoiceStatus::Issued), Just(InvoiceStatus::Cancelled)],
            has_out in any::<bool>()
        ) {
            let decision = check_issue(Uuid::new_v4(), status, has_out).unwrap();
            prop_assert_eq!(decision, IssueDecision::AlreadyFinal(status));
        }

        /// Locks cover every product once, in ascending order
        #[test]
        fn prop_lock_order_sorted_and_complete(specs in lines_strategy()) {
            let invoice = draft_invoice();
            let lines: Vec<_> = specs
                .iter()
                .map(|(idx, qty)| line(&invoice, product(*idx), *qty))
                .collect();
            let order = lock_order(&lines);

            prop_assert!(order.windows(2).all(|w| w[0] < w[1]));
            for l in &lines {
                prop_assert!(order.contains(&l.product_id));
            }
        }

        /// Manual price beats the quote suggestion; total is qty times final
        #[test]
        fn prop_final_price_resolution(
            specs in lines_strategy(),
            manual in prop::collection::vec(prop::option::of(cost_strategy()), 8),
            quoted in cost_strategy()
        ) {
            let invoice = draft_invoice();
            let mut lines: Vec<_> = specs
                .iter()
                .map(|(idx, qty)| line(&invoice, product(*idx), *qty))
                .collect();
            for (l, m) in lines.iter_mut().zip(manual.iter()) {
                l.manual_price = *m;
            }

            lock_line_prices(&mut lines, |_| Some(quoted)).unwrap();

            let mut expected_total = Decimal::ZERO;
            for (l, m) in lines.iter().zip(manual.iter()) {
                let expected = m.unwrap_or(quoted);
                prop_assert_eq!(l.final_price, Some(expected));
                expected_total += expected * l.qty;
            }
            prop_assert_eq!(invoice_total(&lines).unwrap(), expected_total);
        }
    }
}
