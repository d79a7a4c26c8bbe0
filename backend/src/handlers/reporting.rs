//! Reporting handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::DateRange;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reporting::{
    CustomerDetailReport, CustomerSales, InventoryValuationReport, ProductPerformance,
};
use crate::services::ReportingService;
use crate::AppState;

/// Inventory valuation at moving-average cost
pub async fn get_inventory_valuation(
    State(state): State<AppState>,
) -> AppResult<Json<InventoryValuationReport>> {
    let service = ReportingService::new(state.db);
    let report = service.inventory_valuation().await?;
    Ok(Json(report))
}

/// Issued sales grouped by customer
pub async fn get_sales_by_customer(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<Json<Vec<CustomerSales>>> {
    let service = ReportingService::new(state.db);
    let rows = service.sales_by_customer(&range).await?;
    Ok(Json(rows))
}

/// Issued sales per product, best sellers first
pub async fn get_product_performance(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<Json<Vec<ProductPerformance>>> {
    let service = ReportingService::new(state.db);
    let rows = service.product_performance(&range).await?;
    Ok(Json(rows))
}

/// What one customer bought, per SKU and per invoice
pub async fn get_customer_detail(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Query(range): Query<DateRange>,
) -> AppResult<Json<CustomerDetailReport>> {
    let service = ReportingService::new(state.db);
    let report = service.customer_detail(customer_id, &range).await?;
    Ok(Json(report))
}
