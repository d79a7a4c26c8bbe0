//! Route definitions for the trading ledger API

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog and directory
        .nest("/products", product_routes())
        .nest("/partners", partner_routes())
        .nest("/fx", fx_routes())
        // Receiving and stock
        .nest("/lots", lot_routes())
        .nest("/inventory", inventory_routes())
        // Pricing and selling
        .nest("/quotes", quote_routes())
        .nest("/invoices", invoice_routes())
        .nest("/reports", report_routes())
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:product_id", get(handlers::get_product))
        .route("/:product_id/deactivate", post(handlers::deactivate_product))
        .route("/:product_id/balance", get(handlers::get_balance))
}

fn partner_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_partners))
        .route("/:partner_id", get(handlers::get_partner))
}

fn fx_routes() -> Router<AppState> {
    Router::new()
        .route("/periods", get(handlers::list_fx_periods))
        .route("/effective", get(handlers::get_effective_period))
}

fn lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_lots).post(handlers::receive_lot))
        .route("/:lot_id", get(handlers::get_lot))
        .route("/:lot_id/movements", get(handlers::get_lot_movements))
}

fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/balances", get(handlers::list_balances))
        .route("/movements", get(handlers::list_movements))
        .route("/adjustments", post(handlers::adjust_stock))
}

fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route(
            "/:batch_id/lines",
            get(handlers::list_lines).post(handlers::add_line),
        )
        .route("/:batch_id/lines/:line_id", delete(handlers::delete_line))
        .route("/:batch_id/preview", post(handlers::preview_line))
        .route(
            "/:batch_id/products/:product_id/latest",
            get(handlers::get_latest_line),
        )
        .route("/lines/:line_id/manual-price", put(handlers::set_manual_price))
}

fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_invoices).post(handlers::create_invoice))
        .route(
            "/:invoice_id",
            get(handlers::get_invoice).delete(handlers::delete_invoice),
        )
        .route("/:invoice_id/lines", post(handlers::add_invoice_line))
        .route(
            "/:invoice_id/lines/:line_id",
            put(handlers::update_invoice_line).delete(handlers::remove_invoice_line),
        )
        .route("/:invoice_id/issue", post(handlers::issue_invoice))
        .route("/:invoice_id/cancel", post(handlers::cancel_invoice))
        .route("/:invoice_id/movements", get(handlers::get_invoice_movements))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory-valuation", get(handlers::get_inventory_valuation))
        .route("/sales-by-customer", get(handlers::get_sales_by_customer))
        .route("/customers/:customer_id", get(handlers::get_customer_detail))
        .route("/product-performance", get(handlers::get_product_performance))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use shared::PricingDefaults;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, DatabaseConfig, InvoiceConfig, ServerConfig};
    use crate::services::PgFxRateProvider;

    /// Router over a lazy pool; requests that need the database are not sent
    fn app() -> Router {
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/ktrade_test")
            .unwrap();
        let config = Config {
            environment: "test".to_string(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/ktrade_test".to_string(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 1,
            },
            pricing: PricingDefaults::default(),
            invoice: InvoiceConfig {
                number_prefix: "INV".to_string(),
            },
        };

        api_routes().with_state(AppState {
            fx: Arc::new(PgFxRateProvider::new(db.clone())),
            db,
            config: Arc::new(config),
        })
    }

    async fn status_of(method: Method, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_quote_line_delete_route_parses_ids() {
        let status = status_of(Method::DELETE, "/quotes/not-a-batch/lines/not-a-line").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = status_of(Method::GET, "/quotes/not-a-batch/lines/not-a-line").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_customer_detail_route_parses_id() {
        let status = status_of(Method::GET, "/reports/customers/not-a-customer").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reversed_report_range_is_validation_error() {
        let status = status_of(
            Method::GET,
            "/reports/product-performance?start=2026-02-01&end=2026-01-31",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
