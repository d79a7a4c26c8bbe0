//! HTTP handlers for quote batches and lines

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{QuoteBatch, QuoteLine, QuoteLineInput, QuotePricing};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::quoting::{CreateQuoteBatchInput, QuoteLineView, SetManualPriceInput};
use crate::services::QuoteService;
use crate::AppState;

fn quote_service(state: AppState) -> QuoteService {
    QuoteService::new(state.db, state.config.pricing.clone(), state.fx)
}

/// Create a quote batch
pub async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<CreateQuoteBatchInput>,
) -> AppResult<Json<QuoteBatch>> {
    let batch = quote_service(state).create_batch(input).await?;
    Ok(Json(batch))
}

/// List quote batches
pub async fn list_batches(State(state): State<AppState>) -> AppResult<Json<Vec<QuoteBatch>>> {
    let batches = quote_service(state).list_batches().await?;
    Ok(Json(batches))
}

/// Get a quote batch
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<QuoteBatch>> {
    let batch = quote_service(state).get_batch(batch_id).await?;
    Ok(Json(batch))
}

/// Price a line without saving it
pub async fn preview_line(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<QuoteLineInput>,
) -> AppResult<Json<QuotePricing>> {
    let pricing = quote_service(state).preview_line(batch_id, input).await?;
    Ok(Json(pricing))
}

/// Price and save a line
pub async fn add_line(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<QuoteLineInput>,
) -> AppResult<Json<QuoteLineView>> {
    let line = quote_service(state).add_line(batch_id, input).await?;
    Ok(Json(line))
}

/// List the lines of a batch
pub async fn list_lines(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<Vec<QuoteLineView>>> {
    let lines = quote_service(state).list_lines(batch_id).await?;
    Ok(Json(lines))
}

/// Latest line for a product in a batch
pub async fn get_latest_line(
    State(state): State<AppState>,
    Path((batch_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<QuoteLine>> {
    let line = quote_service(state)
        .latest_line_for(batch_id, product_id)
        .await?;
    Ok(Json(line))
}

/// Set or clear a line's manual price
pub async fn set_manual_price(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
    Json(input): Json<SetManualPriceInput>,
) -> AppResult<Json<QuoteLineView>> {
    let line = quote_service(state).set_manual_price(line_id, input).await?;
    Ok(Json(line))
}

/// Delete a line from a batch
pub async fn delete_line(
    State(state): State<AppState>,
    Path((batch_id, line_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    quote_service(state).delete_line(batch_id, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
