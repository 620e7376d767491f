//! Storefront use cases: order placement and listing, customers, catalog.

pub mod config;
pub mod errors;
pub mod services;

pub use config::AppConfig;
pub use errors::{ServiceError, ServiceResult};
pub use services::{AppServices, CatalogService, CustomerService, OrderService, build_services};

/// Initialize tracing and wire services from the environment.
pub async fn bootstrap() -> anyhow::Result<AppServices> {
    storefront_observability::init();
    let config = AppConfig::from_env()?;
    build_services(&config).await
}
