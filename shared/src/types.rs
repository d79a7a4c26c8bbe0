//! Common types used across the platform

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Freight mode used to move goods from Korea to the Philippines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportMode {
    #[default]
    Ocean,
    Air,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Ocean => "OCEAN",
            TransportMode::Air => "AIR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OCEAN" => Some(TransportMode::Ocean),
            "AIR" => Some(TransportMode::Air),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Ocean => write!(f, "Ocean"),
            TransportMode::Air => write!(f, "Air"),
        }
    }
}

/// Pricing settings applied when a quote batch or a receipt leaves a rate unset.
///
/// Loaded from configuration and handed explicitly to the quoting and
/// costing services; there is no global default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingDefaults {
    /// Company margin applied to the supplier-pay component only
    pub company_margin_rate: Decimal,

    /// Supplier markup on top of the supplier's KRW cost
    pub supplier_markup_rate: Decimal,

    /// Final prices are rounded up to a multiple of this (PHP)
    pub rounding_unit_php: Decimal,

    /// Ocean freight rate (KRW per billable kg)
    pub ocean_krw_per_kg: Decimal,

    /// Air freight rate (KRW per billable kg)
    pub air_krw_per_kg: Decimal,
}

impl Default for PricingDefaults {
    fn default() -> Self {
        Self {
            company_margin_rate: Decimal::new(20, 2),
            supplier_markup_rate: Decimal::new(5, 2),
            rounding_unit_php: Decimal::from(10),
            ocean_krw_per_kg: Decimal::from(2200),
            air_krw_per_kg: Decimal::from(14000),
        }
    }
}

impl PricingDefaults {
    /// Freight rate for a transport mode
    pub fn rate_for(&self, mode: TransportMode) -> Decimal {
        match mode {
            TransportMode::Air => self.air_krw_per_kg,
            TransportMode::Ocean => self.ocean_krw_per_kg,
        }
    }
}

/// Optional inclusive date range for report queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// An end date before the start date selects nothing and is refused
    pub fn is_reversed(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if end < start)
    }
}
