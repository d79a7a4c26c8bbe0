//! HTTP handlers for the product catalog and partner directory

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{CreateProductInput, Partner, PartnerType, Product};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::{PartnerService, ProductService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct PartnerListQuery {
    pub partner_type: Option<PartnerType>,
}

/// Register a product
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    let product = service.create_product(input).await?;
    Ok(Json(product))
}

/// Get a product by id
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    let product = service.get_product(product_id).await?;
    Ok(Json(product))
}

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let service = ProductService::new(state.db);
    let products = service.list_products(query.active_only).await?;
    Ok(Json(products))
}

/// Deactivate a product
pub async fn deactivate_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    let product = service.deactivate_product(product_id).await?;
    Ok(Json(product))
}

/// List suppliers and customers
pub async fn list_partners(
    State(state): State<AppState>,
    Query(query): Query<PartnerListQuery>,
) -> AppResult<Json<Vec<Partner>>> {
    let service = PartnerService::new(state.db);
    let partners = service.list_partners(query.partner_type).await?;
    Ok(Json(partners))
}

/// Get a partner by id
pub async fn get_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
) -> AppResult<Json<Partner>> {
    let service = PartnerService::new(state.db);
    let partner = service.get_partner(partner_id).await?;
    Ok(Json(partner))
}
