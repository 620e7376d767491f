//! Process configuration read from the environment.

use anyhow::{Context, ensure};

use storefront_infra::Page;
use storefront_infra::query::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

pub const DATABASE_URL: &str = "STOREFRONT_DATABASE_URL";
pub const DB_MAX_CONNECTIONS: &str = "STOREFRONT_DB_MAX_CONNECTIONS";
pub const DEFAULT_PAGE_LIMIT_VAR: &str = "STOREFRONT_DEFAULT_PAGE_LIMIT";
pub const MAX_PAGE_LIMIT_VAR: &str = "STOREFRONT_MAX_PAGE_LIMIT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let number = |key: &str, default: u32| -> anyhow::Result<u32> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
                None => Ok(default),
            }
        };

        let config = Self {
            database_url: lookup(DATABASE_URL).filter(|url| !url.trim().is_empty()),
            db_max_connections: number(DB_MAX_CONNECTIONS, defaults.db_max_connections)?,
            default_page_limit: number(DEFAULT_PAGE_LIMIT_VAR, defaults.default_page_limit)?,
            max_page_limit: number(MAX_PAGE_LIMIT_VAR, defaults.max_page_limit)?,
        };

        ensure!(config.db_max_connections > 0, "{DB_MAX_CONNECTIONS} must be positive");
        ensure!(config.max_page_limit > 0, "{MAX_PAGE_LIMIT_VAR} must be positive");
        ensure!(
            config.default_page_limit <= config.max_page_limit,
            "{DEFAULT_PAGE_LIMIT_VAR} ({}) exceeds {MAX_PAGE_LIMIT_VAR} ({})",
            config.default_page_limit,
            config.max_page_limit
        );
        Ok(config)
    }

    /// A page using the configured default and maximum limits.
    pub fn page(&self, offset: Option<u32>, limit: Option<u32>) -> Page {
        Page::with_limits(offset, limit, self.default_page_limit, self.max_page_limit)
    }
}
