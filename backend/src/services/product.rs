//! Product catalog and partner directory lookups

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    validate_non_negative, validate_sku_code, CoreError, CreateProductInput, Partner, PartnerType,
    Product, TransportMode,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

const PRODUCT_COLUMNS: &str = "id, sku_code, name_en, name_ko, base_unit, net_weight_kg_per_unit, \
     origin_country, origin_name, default_transport_mode, is_active, created_at";

/// Product service for catalog management
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    sku_code: String,
    name_en: String,
    name_ko: String,
    base_unit: String,
    net_weight_kg_per_unit: Decimal,
    origin_country: Option<String>,
    origin_name: Option<String>,
    default_transport_mode: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let default_transport_mode = row
            .default_transport_mode
            .as_deref()
            .map(|m| {
                TransportMode::parse(m)
                    .ok_or_else(|| AppError::Internal(format!("unknown transport mode '{}'", m)))
            })
            .transpose()?;

        Ok(Product {
            id: row.id,
            sku_code: row.sku_code,
            name_en: row.name_en,
            name_ko: row.name_ko,
            base_unit: row.base_unit,
            net_weight_kg_per_unit: row.net_weight_kg_per_unit,
            origin_country: row.origin_country,
            origin_name: row.origin_name,
            default_transport_mode,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a product
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        validate_sku_code(&input.sku_code).map_err(|e| AppError::validation("sku_code", e))?;
        validate_non_negative(input.net_weight_kg_per_unit)
            .map_err(|e| AppError::validation("net_weight_kg_per_unit", e))?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE sku_code = $1)",
        )
        .bind(&input.sku_code)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("sku_code".to_string()));
        }

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (
                sku_code, name_en, name_ko, base_unit, net_weight_kg_per_unit,
                origin_country, origin_name, default_transport_mode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&input.sku_code)
        .bind(&input.name_en)
        .bind(&input.name_ko)
        .bind(&input.base_unit)
        .bind(input.net_weight_kg_per_unit)
        .bind(&input.origin_country)
        .bind(&input.origin_name)
        .bind(input.default_transport_mode.map(|m| m.as_str()))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(sku = %input.sku_code, "Product registered");
        row.try_into()
    }

    /// Get a product by id
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        let mut conn = self.db.acquire().await?;
        fetch_product(&mut conn, product_id).await
    }

    /// List products ordered by SKU
    pub async fn list_products(&self, active_only: bool) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1 = FALSE OR is_active = TRUE)
            ORDER BY sku_code
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Soft-delete: referenced products are never removed
    pub async fn deactivate_product(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET is_active = FALSE WHERE id = $1 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CoreError::not_found("product", product_id))?;

        tracing::info!(product_id = %product_id, "Product deactivated");
        row.try_into()
    }
}

/// Load a product inside an open connection or transaction
pub(crate) async fn fetch_product(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Product> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {} FROM products WHERE id = $1",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("product", product_id))?;

    row.try_into()
}

/// Load a product and refuse it when deactivated
pub(crate) async fn fetch_active_product(
    conn: &mut PgConnection,
    product_id: Uuid,
    action: &'static str,
) -> AppResult<Product> {
    let product = fetch_product(conn, product_id).await?;
    product.ensure_active(action)?;
    Ok(product)
}

// ============================================================================
// Partners
// ============================================================================

#[derive(Debug, FromRow)]
struct PartnerRow {
    id: Uuid,
    partner_type: String,
    name: String,
    name_ko: String,
    is_active: bool,
}

impl TryFrom<PartnerRow> for Partner {
    type Error = AppError;

    fn try_from(row: PartnerRow) -> Result<Self, Self::Error> {
        let partner_type = PartnerType::parse(&row.partner_type).ok_or_else(|| {
            AppError::Internal(format!("unknown partner type '{}'", row.partner_type))
        })?;
        Ok(Partner {
            id: row.id,
            partner_type,
            name: row.name,
            name_ko: row.name_ko,
            is_active: row.is_active,
        })
    }
}

/// Read-only view of the supplier/customer directory
#[derive(Clone)]
pub struct PartnerService {
    db: PgPool,
}

impl PartnerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_partners(&self, partner_type: Option<PartnerType>) -> AppResult<Vec<Partner>> {
        let rows = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT id, partner_type, name, name_ko, is_active
            FROM partners
            WHERE ($1::varchar IS NULL OR partner_type = $1)
            ORDER BY name
            "#,
        )
        .bind(partner_type.map(|t| t.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Partner::try_from).collect()
    }

    pub async fn get_partner(&self, partner_id: Uuid) -> AppResult<Partner> {
        let row = sqlx::query_as::<_, PartnerRow>(
            "SELECT id, partner_type, name, name_ko, is_active FROM partners WHERE id = $1",
        )
        .bind(partner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CoreError::not_found("partner", partner_id))?;

        row.try_into()
    }
}

/// Resolve a partner of the expected type; a wrong type counts as missing
pub(crate) async fn fetch_partner(
    conn: &mut PgConnection,
    partner_id: Uuid,
    expected: PartnerType,
) -> AppResult<Partner> {
    let entity = match expected {
        PartnerType::Supplier => "supplier",
        PartnerType::Customer => "customer",
    };

    let row = sqlx::query_as::<_, PartnerRow>(
        r#"
        SELECT id, partner_type, name, name_ko, is_active
        FROM partners
        WHERE id = $1 AND partner_type = $2
        "#,
    )
    .bind(partner_id)
    .bind(expected.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found(entity, partner_id))?;

    row.try_into()
}
