//! Domain models for the trading ledger

mod fx;
mod inventory;
mod invoice;
mod lot;
mod product;
mod quote;

pub use fx::*;
pub use inventory::*;
pub use invoice::*;
pub use lot::*;
pub use product::*;
pub use quote::*;
