//! HTTP request handlers

mod fx;
mod health;
mod inventory;
mod invoice;
mod lot;
mod product;
mod quote;
mod reporting;

pub use fx::*;
pub use health::*;
pub use inventory::*;
pub use invoice::*;
pub use lot::*;
pub use product::*;
pub use quote::*;
pub use reporting::*;
