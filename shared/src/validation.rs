//! Validation utilities for costing, pricing and catalog input
//!
//! Quantity checks that belong to the ledger itself live on the models and
//! return `CoreError::InvalidQuantity`; the helpers here reject malformed
//! settings before any computation starts.

use rust_decimal::Decimal;

use crate::models::{LandedCostInput, QuoteLineInput, ReceiveLotInput};

// ============================================================================
// Rate and Amount Validations
// ============================================================================

/// Validate an exchange rate (must be positive)
pub fn validate_fx_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate <= Decimal::ZERO {
        return Err("FX rate must be positive");
    }
    Ok(())
}

/// Validate a markup or margin rate expressed as a fraction (0.05 = 5%)
pub fn validate_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO {
        return Err("Rate cannot be negative");
    }
    if rate >= Decimal::TEN {
        return Err("Rate must be a fraction, e.g. 0.05 for 5%");
    }
    Ok(())
}

/// Validate a cost, weight or freight amount
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    Ok(())
}

/// Validate a manually entered unit price
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate SKU code format (uppercase alphanumeric, dash or underscore)
pub fn validate_sku_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("SKU code is required");
    }
    if code.len() > 50 {
        return Err("SKU code must be at most 50 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("SKU code must be uppercase alphanumeric, '-' or '_'");
    }
    Ok(())
}

/// Longest memo a stock movement can carry
pub const MAX_MOVEMENT_MEMO_LENGTH: usize = 200;

/// Validate the reason given for a manual stock adjustment
pub fn validate_adjustment_memo(memo: &str) -> Result<(), &'static str> {
    if memo.trim().is_empty() {
        return Err("Adjustment reason is required");
    }
    if memo.chars().count() > MAX_MOVEMENT_MEMO_LENGTH {
        return Err("Adjustment reason must be at most 200 characters");
    }
    Ok(())
}

// ============================================================================
// Command Validations
// ============================================================================

/// Validate the settings of a receiving command. Returns the offending field.
pub fn validate_receive_input(input: &ReceiveLotInput) -> Result<(), (&'static str, &'static str)> {
    if let Some(fx) = input.fx_rate {
        validate_fx_rate(fx).map_err(|e| ("fx_rate", e))?;
    }
    if let Some(markup) = input.supplier_markup_rate {
        validate_rate(markup).map_err(|e| ("supplier_markup_rate", e))?;
    }
    validate_non_negative(input.supplier_cost_krw_per_unit)
        .map_err(|e| ("supplier_cost_krw_per_unit", e))?;
    validate_non_negative(input.transport_krw_per_kg).map_err(|e| ("transport_krw_per_kg", e))?;
    validate_non_negative(input.billable_weight_kg).map_err(|e| ("billable_weight_kg", e))?;
    if let Some(other) = input.other_cost_php {
        validate_non_negative(other).map_err(|e| ("other_cost_php", e))?;
    }
    Ok(())
}

/// Validate a resolved landed-cost request, as previewed before receiving.
/// Returns the offending field.
pub fn validate_landed_cost_input(
    input: &LandedCostInput,
) -> Result<(), (&'static str, &'static str)> {
    validate_fx_rate(input.fx_rate).map_err(|e| ("fx_rate", e))?;
    validate_rate(input.supplier_markup_rate).map_err(|e| ("supplier_markup_rate", e))?;
    validate_non_negative(input.supplier_cost_krw_per_unit)
        .map_err(|e| ("supplier_cost_krw_per_unit", e))?;
    validate_non_negative(input.transport_krw_per_kg).map_err(|e| ("transport_krw_per_kg", e))?;
    validate_non_negative(input.billable_weight_kg).map_err(|e| ("billable_weight_kg", e))?;
    validate_non_negative(input.other_cost_php).map_err(|e| ("other_cost_php", e))?;
    Ok(())
}

/// Validate a quote line request. Returns the offending field.
pub fn validate_quote_line_input(input: &QuoteLineInput) -> Result<(), (&'static str, &'static str)> {
    validate_non_negative(input.supplier_cost_krw_per_unit)
        .map_err(|e| ("supplier_cost_krw_per_unit", e))?;
    validate_non_negative(input.billable_weight_kg).map_err(|e| ("billable_weight_kg", e))?;
    validate_non_negative(input.other_cost_php).map_err(|e| ("other_cost_php", e))?;
    if let Some(manual) = input.manual_price {
        validate_price(manual).map_err(|e| ("manual_price", e))?;
    }
    Ok(())
}
