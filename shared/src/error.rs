//! Error taxonomy for ledger, costing, pricing and invoicing operations

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced synchronously by the accounting core.
///
/// Every variant names the entity that failed so the caller can report it.
/// None of them are retried by the core.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoreError {
    #[error("{field} must be greater than zero (got {value})")]
    InvalidQuantity { field: &'static str, value: Decimal },

    #[error("insufficient stock for product {product_id}: on hand {on_hand}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        on_hand: Decimal,
        requested: Decimal,
    },

    #[error("missing final price for product {product_id}")]
    MissingPrice { product_id: Uuid },

    #[error("cannot {action} {entity} in state {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("corrupt state on invoice {invoice_id}: {detail}")]
    CorruptState { invoice_id: Uuid, detail: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{operation} is out of the representable amount range")]
    AmountOutOfRange { operation: &'static str },
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::MissingPrice { .. } => "MISSING_PRICE",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::CorruptState { .. } => "CORRUPT_STATE",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
        }
    }
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Reject zero and negative quantities
pub fn ensure_positive(field: &'static str, value: Decimal) -> CoreResult<()> {
    if value <= Decimal::ZERO {
        return Err(CoreError::InvalidQuantity { field, value });
    }
    Ok(())
}

/// Turn the result of a `checked_*` decimal operation into a typed failure.
///
/// `operation` names the figure being computed, e.g. `"transport total"`.
pub fn checked(value: Option<Decimal>, operation: &'static str) -> CoreResult<Decimal> {
    value.ok_or(CoreError::AmountOutOfRange { operation })
}
