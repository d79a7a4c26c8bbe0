//! Landed-cost tests
//!
//! Covers receipt costing and the inputs it depends on:
//! - Landed total is supplier pay times qty plus freight plus other costs
//! - Markup applies before FX conversion
//! - The effective FX period for a date is the latest-starting one
//! - Receiving commands reject malformed settings

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    compute_landed_cost, effective_period, validate_receive_input, CoreError, FxRatePeriod,
    LandedCostInput, ReceiveLotInput, TransportMode,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn receipt() -> LandedCostInput {
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

fn receive_command() -> ReceiveLotInput {
    ReceiveLotInput {
        product_id: Uuid::new_v4(),
        supplier_id: Uuid::new_v4(),
        received_date: date(2026, 1, 5),
        qty: dec("10"),
        fx_rate: None,
        supplier_cost_krw_per_unit: dec("10000"),
        supplier_markup_rate: None,
        transport_mode: TransportMode::Ocean,
        transport_krw_per_kg: dec("2200"),
        billable_weight_kg: dec("12"),
        other_cost_php: None,
        memo: None,
    }
}

fn period(start: NaiveDate, end: Option<NaiveDate>, rate: &str) -> FxRatePeriod {
    FxRatePeriod {
        id: Uuid::new_v4(),
        start_date: start,
        end_date: end,
        krw_to_php: dec(rate),
        memo: String::new(),
        is_locked: false,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 10 units, 10000 KRW, 5% markup, 12 kg ocean at 2200, FX 0.045
    #[test]
    fn test_reference_receipt() {
        let cost = compute_landed_cost(&receipt()).unwrap();
        assert_eq!(cost.landed_cost_php_total, dec("5913"));
        assert_eq!(cost.landed_cost_php_per_unit, dec("591.3"));
    }

    #[test]
    fn test_air_freight_receipt() {
        let input = LandedCostInput {
            transport_krw_per_kg: dec("14000"),
            billable_weight_kg: dec("2.5"),
            ..receipt()
        };
        let cost = compute_landed_cost(&input).unwrap();
        // 2.5 * 14000 * 0.045
        assert_eq!(cost.transport_php_total, dec("1575"));
        assert_eq!(cost.landed_cost_php_total, dec("6300"));
        assert_eq!(cost.landed_cost_php_per_unit, dec("630"));
    }

    #[test]
    fn test_negative_qty_rejected() {
        let input = LandedCostInput {
            qty: dec("-1"),
            ..receipt()
        };
        assert!(matches!(
            compute_landed_cost(&input),
            Err(CoreError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_effective_period_prefers_latest_start() {
        let periods = vec![
            period(date(2026, 1, 1), None, "0.044"),
            period(date(2026, 2, 1), Some(date(2026, 2, 28)), "0.046"),
        ];

        let jan = effective_period(&periods, date(2026, 1, 20)).unwrap();
        assert_eq!(jan.krw_to_php, dec("0.044"));

        let feb = effective_period(&periods, date(2026, 2, 28)).unwrap();
        assert_eq!(feb.krw_to_php, dec("0.046"));

        let march = effective_period(&periods, date(2026, 3, 1)).unwrap();
        assert_eq!(march.krw_to_php, dec("0.044"));

        assert!(effective_period(&periods, date(2025, 12, 31)).is_none());
    }

    #[test]
    fn test_receive_command_validation() {
        assert!(validate_receive_input(&receive_command()).is_ok());

        let bad_fx = ReceiveLotInput {
            fx_rate: Some(Decimal::ZERO),
            ..receive_command()
        };
        assert_eq!(validate_receive_input(&bad_fx).unwrap_err().0, "fx_rate");

        let large_markup = ReceiveLotInput {
            supplier_markup_rate: Some(dec("5")),
            ..receive_command()
        };
        assert!(validate_receive_input(&large_markup).is_ok());

        let negative_markup = ReceiveLotInput {
            supplier_markup_rate: Some(dec("-0.05")),
            ..receive_command()
        };
        assert_eq!(
            validate_receive_input(&negative_markup).unwrap_err().0,
            "supplier_markup_rate"
        );

        let bad_weight = ReceiveLotInput {
            billable_weight_kg: dec("-1"),
            ..receive_command()
        };
        assert_eq!(
            validate_receive_input(&bad_weight).unwrap_err().0,
            "billable_weight_kg"
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 1000.0
    }

    fn krw_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=1_000_000i64).prop_map(Decimal::from) // 0 to 1,000,000 KRW
    }

    fn rate_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=100i64).prop_map(|n| Decimal::new(n, 2)) // 0.00 to 1.00
    }

    fn fx_strategy() -> impl Strategy<Value = Decimal> {
        (300i64..=600i64).prop_map(|n| Decimal::new(n, 4)) // 0.0300 to 0.0600
    }

    fn weight_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=50000i64).prop_map(|n| Decimal::new(n, 2)) // 0 to 500 kg
    }

    fn input_strategy() -> impl Strategy<Value = LandedCostInput> {
        (
            quantity_strategy(),
            fx_strategy(),
            krw_strategy(),
            rate_strategy(),
            krw_strategy(),
            weight_strategy(),
            (0i64..=100000i64).prop_map(|n| Decimal::new(n, 1)),
        )
            .prop_map(|(qty, fx, cost, markup, freight, weight, other)| LandedCostInput {
                qty,
                fx_rate: fx,
                supplier_cost_krw_per_unit: cost,
                supplier_markup_rate: markup,
                transport_krw_per_kg: freight,
                billable_weight_kg: weight,
                other_cost_php: other,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Landed total is exactly the sum of its three components
        #[test]
        fn prop_landed_total_decomposes(input in input_strategy()) {
            let cost = compute_landed_cost(&input).unwrap();

            let expected = cost.supplier_pay_php_per_unit * input.qty
                + cost.transport_php_total
                + input.other_cost_php;
            prop_assert_eq!(cost.landed_cost_php_total, expected);
            prop_assert_eq!(
                cost.supplier_pay_php_per_unit,
                cost.supplier_pay_krw_per_unit * input.fx_rate
            );
        }

        /// Per-unit cost times qty gives back the total
        #[test]
        fn prop_per_unit_times_qty_is_total(input in input_strategy()) {
            let cost = compute_landed_cost(&input).unwrap();
            let diff = (cost.landed_cost_php_per_unit * input.qty - cost.landed_cost_php_total).abs();
            prop_assert!(diff <= Decimal::new(1, 12));
        }

        /// Landed cost never drops below what the supplier is paid
        #[test]
        fn prop_landed_cost_covers_supplier_pay(input in input_strategy()) {
            let cost = compute_landed_cost(&input).unwrap();
            prop_assert!(
                cost.landed_cost_php_per_unit >= cost.supplier_pay_php_per_unit - Decimal::new(1, 12)
            );
            prop_assert!(cost.supplier_pay_krw_per_unit >= input.supplier_cost_krw_per_unit);
        }

        /// Freight is charged on the whole billable weight, independent of qty
        #[test]
        fn prop_freight_independent_of_qty(
            input in input_strategy(),
            other_qty in quantity_strategy()
        ) {
            let a = compute_landed_cost(&input).unwrap();
            let b = compute_landed_cost(&LandedCostInput { qty: other_qty, ..input.clone() }).unwrap();
            prop_assert_eq!(a.transport_php_total, b.transport_php_total);
            prop_assert_eq!(a.supplier_pay_php_per_unit, b.supplier_pay_php_per_unit);
        }
    }
}
