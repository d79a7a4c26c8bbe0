//! HTTP handlers for sales invoices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{CreateInvoiceInput, InvoiceLineInput, SalesInvoice, SalesInvoiceLine};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::invoicing::{InvoiceDetail, InvoiceFilter, UpdateInvoiceLineInput};
use crate::services::InvoiceService;
use crate::AppState;

fn invoice_service(state: AppState) -> InvoiceService {
    InvoiceService::new(state.db, state.config.invoice.number_prefix.clone())
}

/// Create a draft invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<(StatusCode, Json<InvoiceDetail>)> {
    let invoice = invoice_service(state).create_invoice_draft(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
) -> AppResult<Json<Vec<SalesInvoice>>> {
    let invoices = invoice_service(state).list_invoices(filter).await?;
    Ok(Json(invoices))
}

/// Get an invoice with its lines
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = invoice_service(state).get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

/// Delete a draft invoice
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    invoice_service(state).delete_draft(invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a line to a draft
pub async fn add_invoice_line(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<InvoiceLineInput>,
) -> AppResult<Json<SalesInvoiceLine>> {
    let line = invoice_service(state).add_line(invoice_id, input).await?;
    Ok(Json(line))
}

/// Update a draft line
pub async fn update_invoice_line(
    State(state): State<AppState>,
    Path((invoice_id, line_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateInvoiceLineInput>,
) -> AppResult<Json<SalesInvoiceLine>> {
    let line = invoice_service(state)
        .update_line(invoice_id, line_id, input)
        .await?;
    Ok(Json(line))
}

/// Remove a draft line
pub async fn remove_invoice_line(
    State(state): State<AppState>,
    Path((invoice_id, line_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    invoice_service(state)
        .remove_line(invoice_id, line_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue an invoice (idempotent)
pub async fn issue_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = invoice_service(state).issue_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

/// Cancel an issued invoice
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = invoice_service(state).cancel_invoice(invoice_id).await?;
    Ok(Json(invoice))
}
