//! Inventory ledger models: per-product balance and the movement journal

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{checked, ensure_positive, CoreError, CoreResult};

/// Movement journal entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
    Adj,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adj => "ADJ",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(MovementType::In),
            "OUT" => Some(MovementType::Out),
            "ADJ" => Some(MovementType::Adj),
            _ => None,
        }
    }
}

/// Whether a movement added stock or removed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    In,
    Out,
}

impl TransactionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::In => "in",
            TransactionDirection::Out => "out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(TransactionDirection::In),
            "out" => Some(TransactionDirection::Out),
            _ => None,
        }
    }
}

/// The entity that caused a movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementRef {
    Lot { id: Uuid },
    Invoice { id: Uuid },
    Adjustment { memo: String },
}

impl MovementRef {
    pub const LOT: &'static str = "lot";
    pub const INVOICE: &'static str = "invoice";
    pub const ADJUSTMENT: &'static str = "adjustment";

    pub fn kind(&self) -> &'static str {
        match self {
            MovementRef::Lot { .. } => Self::LOT,
            MovementRef::Invoice { .. } => Self::INVOICE,
            MovementRef::Adjustment { .. } => Self::ADJUSTMENT,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            MovementRef::Lot { id } | MovementRef::Invoice { id } => Some(*id),
            MovementRef::Adjustment { .. } => None,
        }
    }

    /// Rebuild from the persisted `(ref_kind, ref_id)` pair.
    /// Adjustments carry their reason in the movement memo.
    pub fn from_parts(kind: &str, id: Option<Uuid>, memo: &str) -> Option<Self> {
        match (kind, id) {
            (Self::LOT, Some(id)) => Some(MovementRef::Lot { id }),
            (Self::INVOICE, Some(id)) => Some(MovementRef::Invoice { id }),
            (Self::ADJUSTMENT, _) => Some(MovementRef::Adjustment {
                memo: memo.to_string(),
            }),
            _ => None,
        }
    }
}

/// A movement produced by a balance mutation, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementDraft {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub direction: TransactionDirection,
    /// Always positive; the direction carries the sign
    pub qty: Decimal,
    pub reference: MovementRef,
    pub memo: String,
}

/// A persisted, append-only journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub direction: TransactionDirection,
    pub qty: Decimal,
    pub reference: MovementRef,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

/// Current stock state of one product.
///
/// Only the ledger operations below mutate it. `avg_unit_cost` is a
/// moving average in PHP per unit and is treated as zero while the
/// product has no stock on hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub product_id: Uuid,
    pub on_hand_qty: Decimal,
    pub avg_unit_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    pub fn empty(product_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            product_id,
            on_hand_qty: Decimal::ZERO,
            avg_unit_cost: Decimal::ZERO,
            updated_at: now,
        }
    }

    /// Average cost as used for valuation
    pub fn effective_avg_cost(&self) -> Decimal {
        if self.on_hand_qty.is_zero() {
            Decimal::ZERO
        } else {
            self.avg_unit_cost
        }
    }

    /// Stock value in PHP
    pub fn inventory_value(&self) -> CoreResult<Decimal> {
        checked(
            self.on_hand_qty.checked_mul(self.effective_avg_cost()),
            "stock value",
        )
    }

    /// Receive stock at `unit_cost` and blend it into the moving average:
    /// `(old_qty * old_avg + qty * unit_cost) / (old_qty + qty)`
    pub fn apply_in(
        &mut self,
        qty: Decimal,
        unit_cost: Decimal,
        reference: MovementRef,
        memo: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<MovementDraft> {
        ensure_positive("qty", qty)?;

        let new_qty = checked(self.on_hand_qty.checked_add(qty), "on-hand qty")?;
        let current = self.inventory_value()?;
        let blended = checked(
            qty.checked_mul(unit_cost)
                .and_then(|incoming| incoming.checked_add(current)),
            "stock value",
        )?;
        self.avg_unit_cost = checked(blended.checked_div(new_qty), "average cost")?;
        self.on_hand_qty = new_qty;
        self.updated_at = now;

        Ok(self.draft(MovementType::In, TransactionDirection::In, qty, reference, memo))
    }

    /// Withdraw stock. The average cost is left as it is.
    pub fn apply_out(
        &mut self,
        qty: Decimal,
        reference: MovementRef,
        memo: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<MovementDraft> {
        ensure_positive("qty", qty)?;
        self.ensure_available(qty)?;

        self.on_hand_qty -= qty;
        self.updated_at = now;

        Ok(self.draft(MovementType::Out, TransactionDirection::Out, qty, reference, memo))
    }

    /// Put back stock that an earlier OUT removed, without blending.
    ///
    /// Used by invoice cancellation: the OUT never changed the average, so
    /// the restore must not either.
    pub fn apply_restore(
        &mut self,
        qty: Decimal,
        reference: MovementRef,
        memo: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<MovementDraft> {
        ensure_positive("qty", qty)?;

        self.on_hand_qty = self.revalued_qty(qty)?;
        self.updated_at = now;

        Ok(self.draft(MovementType::In, TransactionDirection::In, qty, reference, memo))
    }

    /// Correct the on-hand quantity by `delta` (either sign) at the current
    /// average cost.
    pub fn apply_adjust(
        &mut self,
        delta: Decimal,
        memo: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<MovementDraft> {
        if delta.is_zero() {
            return Err(CoreError::InvalidQuantity {
                field: "delta_qty",
                value: delta,
            });
        }

        let direction = if delta.is_sign_negative() {
            self.ensure_available(-delta)?;
            TransactionDirection::Out
        } else {
            TransactionDirection::In
        };

        self.on_hand_qty = self.revalued_qty(delta)?;
        self.updated_at = now;

        let memo = memo.into();
        let reference = MovementRef::Adjustment { memo: memo.clone() };
        Ok(self.draft(MovementType::Adj, direction, delta.abs(), reference, memo))
    }

    /// On-hand qty after adding `delta` at the current average, refused when
    /// the resulting stock value would not fit a decimal
    fn revalued_qty(&self, delta: Decimal) -> CoreResult<Decimal> {
        let qty = checked(self.on_hand_qty.checked_add(delta), "on-hand qty")?;
        if !qty.is_zero() {
            checked(qty.checked_mul(self.avg_unit_cost), "stock value")?;
        }
        Ok(qty)
    }

    fn ensure_available(&self, requested: Decimal) -> CoreResult<()> {
        if requested > self.on_hand_qty {
            return Err(CoreError::InsufficientStock {
                product_id: self.product_id,
                on_hand: self.on_hand_qty,
                requested,
            });
        }
        Ok(())
    }

    fn draft(
        &self,
        movement_type: MovementType,
        direction: TransactionDirection,
        qty: Decimal,
        reference: MovementRef,
        memo: impl Into<String>,
    ) -> MovementDraft {
        MovementDraft {
            product_id: self.product_id,
            movement_type,
            direction,
            qty,
            reference,
            memo: memo.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn balance(qty: &str, avg: &str) -> Balance {
        Balance {
            product_id: Uuid::new_v4(),
            on_hand_qty: dec(qty),
            avg_unit_cost: dec(avg),
            updated_at: Utc::now(),
        }
    }

    fn lot_ref() -> MovementRef {
        MovementRef::Lot { id: Uuid::new_v4() }
    }

    #[test]
    fn test_in_blends_then_out_keeps_average() {
        let mut b = balance("10", "100");

        b.apply_in(dec("10"), dec("140"), lot_ref(), "", Utc::now()).unwrap();
        assert_eq!(b.on_hand_qty, dec("20"));
        assert_eq!(b.avg_unit_cost, dec("120"));

        let invoice = MovementRef::Invoice { id: Uuid::new_v4() };
        let m = b.apply_out(dec("5"), invoice, "", Utc::now()).unwrap();
        assert_eq!(b.on_hand_qty, dec("15"));
        assert_eq!(b.avg_unit_cost, dec("120"));
        assert_eq!(m.movement_type, MovementType::Out);
        assert_eq!(m.qty, dec("5"));
    }

    #[test]
    fn test_first_receipt_sets_average() {
        let mut b = Balance::empty(Uuid::new_v4(), Utc::now());
        let m = b
            .apply_in(dec("10"), dec("591.3"), lot_ref(), "first", Utc::now())
            .unwrap();
        assert_eq!(b.avg_unit_cost, dec("591.3"));
        assert_eq!(m.direction, TransactionDirection::In);
        assert_eq!(m.memo, "first");
    }

    #[test]
    fn test_stale_average_ignored_when_empty() {
        // stock ran out at avg 100; the next receipt must not inherit it
        let mut b = balance("0", "100");
        b.apply_in(dec("4"), dec("50"), lot_ref(), "", Utc::now()).unwrap();
        assert_eq!(b.avg_unit_cost, dec("50"));
        assert_eq!(balance("0", "100").inventory_value().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_out_exceeding_stock_leaves_balance_untouched() {
        let mut b = balance("3", "100");
        let before = b.clone();
        let err = b
            .apply_out(dec("5"), MovementRef::Invoice { id: Uuid::nil() }, "", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(b, before);
    }

    #[test]
    fn test_non_positive_quantities_rejected() {
        let mut b = balance("3", "100");
        assert!(matches!(
            b.apply_in(Decimal::ZERO, dec("1"), lot_ref(), "", Utc::now()),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            b.apply_out(dec("-1"), lot_ref(), "", Utc::now()),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            b.apply_adjust(Decimal::ZERO, "noop", Utc::now()),
            Err(CoreError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_restore_does_not_blend() {
        let mut b = balance("2", "120");
        b.apply_restore(dec("5"), MovementRef::Invoice { id: Uuid::nil() }, "", Utc::now())
            .unwrap();
        assert_eq!(b.on_hand_qty, dec("7"));
        assert_eq!(b.avg_unit_cost, dec("120"));
    }

    #[test]
    fn test_adjustment_directions() {
        let mut b = balance("10", "80");

        let m = b.apply_adjust(dec("-4"), "breakage", Utc::now()).unwrap();
        assert_eq!(m.direction, TransactionDirection::Out);
        assert_eq!(m.qty, dec("4"));
        assert_eq!(
            m.reference,
            MovementRef::Adjustment {
                memo: "breakage".to_string()
            }
        );
        assert_eq!(b.on_hand_qty, dec("6"));

        let m = b.apply_adjust(dec("1.5"), "recount", Utc::now()).unwrap();
        assert_eq!(m.direction, TransactionDirection::In);
        assert_eq!(b.on_hand_qty, dec("7.5"));
        assert_eq!(b.avg_unit_cost, dec("80"));

        assert!(matches!(
            b.apply_adjust(dec("-8"), "too much", Utc::now()),
            Err(CoreError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_movement_ref_parts() {
        let id = Uuid::new_v4();
        let r = MovementRef::Invoice { id };
        assert_eq!(MovementRef::from_parts(r.kind(), r.id(), ""), Some(r));
        assert_eq!(
            MovementRef::from_parts("adjustment", None, "recount"),
            Some(MovementRef::Adjustment {
                memo: "recount".to_string()
            })
        );
        assert_eq!(MovementRef::from_parts("lot", None, ""), None);
        assert_eq!(MovementRef::from_parts("sale", Some(id), ""), None);
    }

    #[test]
    fn test_blend_overflow_leaves_balance_untouched() {
        let mut b = balance("10000000000000000", "10000000000000");
        let before = b.clone();
        assert!(matches!(
            b.apply_in(dec("1"), dec("1"), lot_ref(), "", Utc::now()),
            Err(CoreError::AmountOutOfRange { .. })
        ));
        assert_eq!(b, before);
    }

    #[test]
    fn test_restore_refuses_unrepresentable_value() {
        let mut b = balance("1", "10000000000000000000000000000");
        assert!(matches!(
            b.apply_restore(dec("100"), lot_ref(), "", Utc::now()),
            Err(CoreError::AmountOutOfRange { .. })
        ));
        assert_eq!(b.on_hand_qty, dec("1"));
    }
}
