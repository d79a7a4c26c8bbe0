//! Receiving lots and the landed-cost calculation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{checked, ensure_positive, CoreResult};
use crate::types::TransportMode;

/// Inputs that fix the cost of one receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandedCostInput {
    pub qty: Decimal,
    /// KRW → PHP
    pub fx_rate: Decimal,
    pub supplier_cost_krw_per_unit: Decimal,
    pub supplier_markup_rate: Decimal,
    pub transport_krw_per_kg: Decimal,
    pub billable_weight_kg: Decimal,
    #[serde(default)]
    pub other_cost_php: Decimal,
}

/// Derived cost figures, all frozen onto the lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandedCost {
    pub supplier_pay_krw_per_unit: Decimal,
    pub supplier_pay_php_per_unit: Decimal,
    pub transport_php_total: Decimal,
    pub landed_cost_php_total: Decimal,
    pub landed_cost_php_per_unit: Decimal,
}

/// Compute the landed cost of a receipt.
///
/// Order is fixed: supplier pay (markup, then FX), freight for the whole
/// billable weight, plus other PHP costs, divided over the received qty.
pub fn compute_landed_cost(input: &LandedCostInput) -> CoreResult<LandedCost> {
    ensure_positive("qty", input.qty)?;

    let markup = checked(
        Decimal::ONE.checked_add(input.supplier_markup_rate),
        "supplier markup",
    )?;
    let supplier_pay_krw_per_unit = checked(
        input.supplier_cost_krw_per_unit.checked_mul(markup),
        "supplier pay",
    )?;
    let supplier_pay_php_per_unit =
        checked(supplier_pay_krw_per_unit.checked_mul(input.fx_rate), "supplier pay")?;

    let transport_php_total = checked(
        input
            .billable_weight_kg
            .checked_mul(input.transport_krw_per_kg)
            .and_then(|krw| krw.checked_mul(input.fx_rate)),
        "transport total",
    )?;

    let landed_cost_php_total = checked(
        supplier_pay_php_per_unit
            .checked_mul(input.qty)
            .and_then(|v| v.checked_add(transport_php_total))
            .and_then(|v| v.checked_add(input.other_cost_php)),
        "landed total",
    )?;
    let landed_cost_php_per_unit =
        checked(landed_cost_php_total.checked_div(input.qty), "landed unit cost")?;

    Ok(LandedCost {
        supplier_pay_krw_per_unit,
        supplier_pay_php_per_unit,
        transport_php_total,
        landed_cost_php_total,
        landed_cost_php_per_unit,
    })
}

/// One receiving event with its immutable cost snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: Uuid,
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub received_date: NaiveDate,
    pub qty_received: Decimal,
    pub qty_remaining: Decimal,

    // snapshot inputs
    pub fx_rate_snapshot: Decimal,
    pub supplier_cost_krw_per_unit: Decimal,
    pub supplier_markup_rate_snapshot: Decimal,
    pub transport_mode: TransportMode,
    pub transport_krw_per_kg_snapshot: Decimal,
    pub billable_weight_kg_total: Decimal,
    pub other_cost_php_total: Decimal,

    // derived totals
    pub transport_php_total_snapshot: Decimal,
    pub landed_cost_php_total: Decimal,
    pub landed_cost_php_per_unit: Decimal,

    pub memo: String,
    pub created_at: DateTime<Utc>,
}

/// Receiving command.
///
/// `fx_rate` and `supplier_markup_rate` are optional; the costing service
/// resolves them from the FX provider and the pricing defaults, then
/// snapshots whatever it used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveLotInput {
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub received_date: NaiveDate,
    pub qty: Decimal,
    pub fx_rate: Option<Decimal>,
    pub supplier_cost_krw_per_unit: Decimal,
    pub supplier_markup_rate: Option<Decimal>,
    #[serde(default)]
    pub transport_mode: TransportMode,
    pub transport_krw_per_kg: Decimal,
    pub billable_weight_kg: Decimal,
    pub other_cost_php: Option<Decimal>,
    pub memo: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample_input() -> LandedCostInput {
        LandedCostInput {
            qty: dec("10"),
            fx_rate: dec("0.045"),
            supplier_cost_krw_per_unit: dec("10000"),
            supplier_markup_rate: dec("0.05"),
            transport_krw_per_kg: dec("2200"),
            billable_weight_kg: dec("12"),
            other_cost_php: Decimal::ZERO,
        }
    }

    #[test]
    fn test_landed_cost_reference_receipt() {
        let cost = compute_landed_cost(&sample_input()).unwrap();
        assert_eq!(cost.supplier_pay_krw_per_unit, dec("10500"));
        assert_eq!(cost.supplier_pay_php_per_unit, dec("472.5"));
        assert_eq!(cost.transport_php_total, dec("1188"));
        assert_eq!(cost.landed_cost_php_total, dec("5913"));
        assert_eq!(cost.landed_cost_php_per_unit, dec("591.3"));
    }

    #[test]
    fn test_other_costs_spread_over_qty() {
        let input = LandedCostInput {
            other_cost_php: dec("500"),
            ..sample_input()
        };
        let cost = compute_landed_cost(&input).unwrap();
        assert_eq!(cost.landed_cost_php_total, dec("6413"));
        assert_eq!(cost.landed_cost_php_per_unit, dec("641.3"));
    }

    #[test]
    fn test_zero_qty_is_rejected_before_division() {
        let input = LandedCostInput {
            qty: Decimal::ZERO,
            ..sample_input()
        };
        assert!(matches!(
            compute_landed_cost(&input),
            Err(CoreError::InvalidQuantity { field: "qty", .. })
        ));
    }

    #[test]
    fn test_oversized_receipt_is_typed_failure() {
        let input = LandedCostInput {
            qty: dec("10000000000000000"),
            supplier_cost_krw_per_unit: dec("10000000000000000"),
            ..sample_input()
        };
        assert!(matches!(
            compute_landed_cost(&input),
            Err(CoreError::AmountOutOfRange { .. })
        ));
    }
}
