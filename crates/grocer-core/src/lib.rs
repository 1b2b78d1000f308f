mod app_config;
mod config;
pub mod products;
pub mod retailer;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{Category, ProductRecord, Subcategory};
pub use retailer::Retailer;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("unknown retailer \"{0}\" (expected one of: coles, woolworths)")]
    UnknownRetailer(String),
}
