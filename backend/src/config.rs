//! Server settings
//!
//! Layered in this order, later layers winning:
//! 1. Built-in defaults below
//! 2. `config/{environment}.toml`, if present
//! 3. `KP__`-prefixed environment variables, e.g. `KP__DATABASE__URL`
//!
//! The environment name itself comes from `KP_ENVIRONMENT`.

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::PricingDefaults;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// `development` runs migrations at startup
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,

    /// Fallback rates for quote batches and receipts
    pub pricing: PricingDefaults,
    pub invoice: InvoiceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InvoiceConfig {
    /// Prefix of generated invoice numbers (PREFIX-YYYY-NNNN)
    pub number_prefix: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("KP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(Environment::with_prefix("KP").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let pricing = PricingDefaults::default();

        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            // Decimals as strings so they never pass through f64
            .set_default("pricing.company_margin_rate", pricing.company_margin_rate.to_string())?
            .set_default("pricing.supplier_markup_rate", pricing.supplier_markup_rate.to_string())?
            .set_default("pricing.rounding_unit_php", pricing.rounding_unit_php.to_string())?
            .set_default("pricing.ocean_krw_per_kg", pricing.ocean_krw_per_kg.to_string())?
            .set_default("pricing.air_krw_per_kg", pricing.air_krw_per_kg.to_string())?
            .set_default("invoice.number_prefix", "INV")
    }
}
