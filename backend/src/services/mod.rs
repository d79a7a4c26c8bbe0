//! Business logic services for the trading ledger

pub mod costing;
pub mod fx;
pub mod invoicing;
pub mod ledger;
pub mod product;
pub mod quoting;
pub mod reporting;

pub use costing::CostingService;
pub use fx::{FxRateProvider, PgFxRateProvider};
pub use invoicing::InvoiceService;
pub use ledger::InventoryLedger;
pub use product::{PartnerService, ProductService};
pub use quoting::QuoteService;
pub use reporting::ReportingService;
