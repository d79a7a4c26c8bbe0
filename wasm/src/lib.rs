//! WebAssembly module for the K-Trade Ledger price calculator
//!
//! Lets the browser preview figures before anything is posted:
//! - Landed cost of a receipt
//! - Customer price of a quote line
//! - Rounding and manual price variance
//!
//! Amounts cross the boundary as decimal strings inside JSON so no value is
//! ever routed through an `f64`.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use shared::{
    ceil_to_unit, compute_landed_cost, compute_quote_line, price_variance_percent,
    validate_landed_cost_input, validate_quote_line_input, validate_sku_code, LandedCostInput,
    QuoteLineInput, QuoteSettings, TransportMode,
};

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn to_js_error(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    js_sys::Error::new(&message).into()
}

// ============================================================================
// Pure helpers (testable off-wasm)
// ============================================================================

fn landed_cost_json(input_json: &str) -> Result<String, String> {
    let input: LandedCostInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid receipt JSON: {}", e))?;
    validate_landed_cost_input(&input).map_err(|(field, message)| format!("{}: {}", field, message))?;
    let cost = compute_landed_cost(&input).map_err(|e| e.to_string())?;
    serde_json::to_string(&cost).map_err(|e| e.to_string())
}

#[derive(Deserialize)]
struct QuotePreviewRequest {
    settings: QuoteSettings,
    line: QuoteLineInput,
    #[serde(default)]
    product_default_mode: Option<TransportMode>,
}

fn quote_preview_json(request_json: &str) -> Result<String, String> {
    let request: QuotePreviewRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid quote JSON: {}", e))?;
    validate_quote_line_input(&request.line)
        .map_err(|(field, message)| format!("{}: {}", field, message))?;

    let priced = compute_quote_line(&request.settings, &request.line, request.product_default_mode)
        .map_err(|e| e.to_string())?;
    serde_json::to_string(&priced).map_err(|e| e.to_string())
}

fn round_up(value: &str, unit: &str) -> Result<String, String> {
    let value = parse_decimal("value", value)?;
    let unit = parse_decimal("unit", unit)?;
    let rounded = ceil_to_unit(value, unit).map_err(|e| e.to_string())?;
    Ok(rounded.normalize().to_string())
}

fn variance(base: &str, manual: &str) -> Result<Option<String>, String> {
    let base = parse_decimal("base", base)?;
    let manual = parse_decimal("manual", manual)?;
    Ok(price_variance_percent(base, manual).map(|v| v.round_dp(2).normalize().to_string()))
}

// ============================================================================
// JavaScript bindings
// ============================================================================

/// Landed cost of a receipt. Takes and returns JSON.
#[wasm_bindgen(js_name = previewLandedCost)]
pub fn preview_landed_cost(input_json: &str) -> Result<String, JsValue> {
    landed_cost_json(input_json).map_err(to_js_error)
}

/// Price one quote line against batch settings. Takes
/// `{ settings, line, product_default_mode? }` and returns the pricing JSON.
#[wasm_bindgen(js_name = previewQuotePrice)]
pub fn preview_quote_price(request_json: &str) -> Result<String, JsValue> {
    quote_preview_json(request_json).map_err(to_js_error)
}

/// Round a PHP amount up to the next multiple of `unit`
#[wasm_bindgen(js_name = ceilToUnit)]
pub fn ceil_to_unit_str(value: &str, unit: &str) -> Result<String, JsValue> {
    round_up(value, unit).map_err(to_js_error)
}

/// Manual price deviation from the base price, in percent (2 dp).
/// `undefined` when the base is zero.
#[wasm_bindgen(js_name = priceVariancePercent)]
pub fn price_variance(base: &str, manual: &str) -> Result<Option<String>, JsValue> {
    variance(base, manual).map_err(to_js_error)
}

#[wasm_bindgen(js_name = isValidSku)]
pub fn is_valid_sku(code: &str) -> bool {
    validate_sku_code(code).is_ok()
}
