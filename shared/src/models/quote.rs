//! Quote batches and customer price calculation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{checked, ensure_positive, CoreResult};
use crate::types::TransportMode;

/// Round `value` up to the next multiple of `unit`.
///
/// unit=10: 3621.94 → 3630. A non-positive unit disables rounding.
pub fn ceil_to_unit(value: Decimal, unit: Decimal) -> CoreResult<Decimal> {
    if unit <= Decimal::ZERO {
        return Ok(value);
    }
    let steps = checked(value.checked_div(unit), "rounding")?.ceil();
    checked(steps.checked_mul(unit), "rounding")
}

/// Pricing settings a quote line is computed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSettings {
    pub fx_rate: Decimal,
    pub company_margin_rate: Decimal,
    pub supplier_markup_rate: Decimal,
    pub ocean_krw_per_kg: Decimal,
    pub air_krw_per_kg: Decimal,
    pub rounding_unit_php: Decimal,
}

impl QuoteSettings {
    pub fn rate_for(&self, mode: TransportMode) -> Decimal {
        match mode {
            TransportMode::Air => self.air_krw_per_kg,
            TransportMode::Ocean => self.ocean_krw_per_kg,
        }
    }
}

/// A named bundle of pricing settings with its FX rate frozen at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteBatch {
    pub id: Uuid,
    pub name: String,
    pub fx_period_id: Uuid,
    pub fx_rate_snapshot: Decimal,
    pub company_margin_rate: Decimal,
    pub supplier_markup_rate: Decimal,
    pub rounding_unit_php: Decimal,
    pub ocean_krw_per_kg: Decimal,
    pub air_krw_per_kg: Decimal,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

impl QuoteBatch {
    pub fn settings(&self) -> QuoteSettings {
        QuoteSettings {
            fx_rate: self.fx_rate_snapshot,
            company_margin_rate: self.company_margin_rate,
            supplier_markup_rate: self.supplier_markup_rate,
            ocean_krw_per_kg: self.ocean_krw_per_kg,
            air_krw_per_kg: self.air_krw_per_kg,
            rounding_unit_php: self.rounding_unit_php,
        }
    }
}

/// Per-product quote request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLineInput {
    pub product_id: Uuid,
    pub qty: Decimal,
    pub supplier_cost_krw_per_unit: Decimal,
    pub billable_weight_kg: Decimal,
    #[serde(default)]
    pub other_cost_php: Decimal,
    pub transport_mode: Option<TransportMode>,
    pub manual_price: Option<Decimal>,
}

/// Result of pricing one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotePricing {
    pub fx_rate: Decimal,
    pub transport_mode: TransportMode,
    pub rate_krw_per_kg: Decimal,
    pub supplier_pay_php_per_unit: Decimal,
    pub transport_php_total: Decimal,
    pub transport_php_per_unit: Decimal,
    pub other_php_per_unit: Decimal,
    /// Pre-rounding price, kept for variance reporting
    pub base_price: Decimal,
    pub final_price: Decimal,
}

/// Price one quote line.
///
/// The company margin applies to the supplier-pay component only; freight
/// and other costs are added after the margin. Rounding applies to the
/// final price only, and a manual price replaces it outright.
pub fn compute_quote_line(
    settings: &QuoteSettings,
    input: &QuoteLineInput,
    product_default_mode: Option<TransportMode>,
) -> CoreResult<QuotePricing> {
    ensure_positive("qty", input.qty)?;

    let fx = settings.fx_rate;
    let markup = checked(
        Decimal::ONE.checked_add(settings.supplier_markup_rate),
        "supplier markup",
    )?;
    let supplier_pay_krw_per_unit = checked(
        input.supplier_cost_krw_per_unit.checked_mul(markup),
        "supplier pay",
    )?;
    let supplier_pay_php_per_unit = checked(supplier_pay_krw_per_unit.checked_mul(fx), "supplier pay")?;

    let transport_mode = input
        .transport_mode
        .or(product_default_mode)
        .unwrap_or(TransportMode::Ocean);
    let rate_krw_per_kg = settings.rate_for(transport_mode);

    let transport_php_total = checked(
        input
            .billable_weight_kg
            .checked_mul(rate_krw_per_kg)
            .and_then(|krw| krw.checked_mul(fx)),
        "transport total",
    )?;
    let transport_php_per_unit = checked(transport_php_total.checked_div(input.qty), "transport per unit")?;
    let other_php_per_unit = checked(input.other_cost_php.checked_div(input.qty), "other cost per unit")?;

    let margin = checked(
        Decimal::ONE.checked_add(settings.company_margin_rate),
        "company margin",
    )?;
    let base_price = checked(
        supplier_pay_php_per_unit
            .checked_mul(margin)
            .and_then(|p| p.checked_add(transport_php_per_unit))
            .and_then(|p| p.checked_add(other_php_per_unit)),
        "base price",
    )?;

    let final_price = resolve_final_price(base_price, settings.rounding_unit_php, input.manual_price)?;

    Ok(QuotePricing {
        fx_rate: fx,
        transport_mode,
        rate_krw_per_kg,
        supplier_pay_php_per_unit,
        transport_php_total,
        transport_php_per_unit,
        other_php_per_unit,
        base_price,
        final_price,
    })
}

/// `manual` if set, otherwise the rounded base price
pub fn resolve_final_price(
    base: Decimal,
    rounding_unit: Decimal,
    manual: Option<Decimal>,
) -> CoreResult<Decimal> {
    match manual {
        Some(price) => Ok(price),
        None => ceil_to_unit(base, rounding_unit),
    }
}

/// `(manual - base) / base * 100`, undefined for a zero base or when the
/// ratio does not fit a decimal
pub fn price_variance_percent(base: Decimal, manual: Decimal) -> Option<Decimal> {
    if base.is_zero() {
        return None;
    }
    manual
        .checked_sub(base)?
        .checked_div(base)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// A persisted quote line with its computed snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLine {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub product_id: Uuid,
    /// Line-level override; `None` means the product default was used
    pub transport_mode: Option<TransportMode>,
    pub qty: Decimal,
    pub supplier_cost_krw_per_unit: Decimal,
    pub billable_weight_kg: Decimal,
    pub other_cost_php: Decimal,
    pub fx_rate_snapshot: Decimal,
    pub supplier_pay_php_per_unit: Decimal,
    pub transport_php_total: Decimal,
    pub transport_php_per_unit: Decimal,
    pub base_price: Decimal,
    pub manual_price: Option<Decimal>,
    pub final_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl QuoteLine {
    pub fn variance_percent(&self) -> Option<Decimal> {
        self.manual_price
            .and_then(|manual| price_variance_percent(self.base_price, manual))
    }
}
