//! Product and trading partner models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{CoreError, CoreResult};
use crate::types::TransportMode;

/// A stocked item, identified by its SKU code.
///
/// Products referenced by a lot or a sale are never deleted; they are
/// deactivated instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku_code: String,
    pub name_en: String,
    pub name_ko: String,
    /// Unit-of-measure label (pack, kg, 500g ...)
    pub base_unit: String,
    pub net_weight_kg_per_unit: Decimal,
    /// ISO country code, e.g. KR, NO, CL
    pub origin_country: Option<String>,
    pub origin_name: Option<String>,
    /// Used by quoting when a line does not override the mode
    pub default_transport_mode: Option<TransportMode>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Fail when a ledger-facing operation targets a deactivated product
    pub fn ensure_active(&self, action: &'static str) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::InvalidTransition {
                entity: "product",
                from: format!("inactive ({})", self.sku_code),
                action,
            });
        }
        Ok(())
    }
}

/// Input for registering a product
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 50))]
    pub sku_code: String,
    #[validate(length(min = 1, max = 120))]
    pub name_en: String,
    #[validate(length(max = 120))]
    #[serde(default)]
    pub name_ko: String,
    #[validate(length(min = 1, max = 30))]
    pub base_unit: String,
    pub net_weight_kg_per_unit: Decimal,
    #[validate(length(equal = 2))]
    pub origin_country: Option<String>,
    #[validate(length(max = 50))]
    pub origin_name: Option<String>,
    pub default_transport_mode: Option<TransportMode>,
}

/// Kind of trading partner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartnerType {
    Supplier,
    Customer,
}

impl PartnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerType::Supplier => "SUPPLIER",
            PartnerType::Customer => "CUSTOMER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUPPLIER" => Some(PartnerType::Supplier),
            "CUSTOMER" => Some(PartnerType::Customer),
            _ => None,
        }
    }
}

/// Supplier or customer. The core only references partners by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub partner_type: PartnerType,
    pub name: String,
    pub name_ko: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(is_active: bool) -> Product {
        Product {
            id: Uuid::new_v4(),
            sku_code: "KR-GIM-001".to_string(),
            name_en: "Roasted seaweed".to_string(),
            name_ko: "김".to_string(),
            base_unit: "pack".to_string(),
            net_weight_kg_per_unit: Decimal::new(25, 3),
            origin_country: Some("KR".to_string()),
            origin_name: None,
            default_transport_mode: None,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_product_passes() {
        assert!(product(true).ensure_active("receive").is_ok());
    }

    #[test]
    fn test_inactive_product_refused_for_every_ledger_action() {
        let inactive = product(false);
        for action in ["receive", "quote", "sell", "adjust stock of"] {
            let err = inactive.ensure_active(action).unwrap_err();
            assert_eq!(err.code(), "INVALID_TRANSITION");
            assert_eq!(
                err,
                CoreError::InvalidTransition {
                    entity: "product",
                    from: "inactive (KR-GIM-001)".to_string(),
                    action,
                }
            );
        }
    }
}
