//! Shared domain core for the Korea→Philippines trading ledger
//!
//! This crate holds the accounting rules shared between the backend server
//! and the browser calculator (via WASM): moving-average stock arithmetic,
//! landed-cost snapshots, quote pricing and the sales invoice state machine.
//! Nothing in here performs I/O.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
