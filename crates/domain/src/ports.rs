//! Port definitions (traits) for external dependencies
//!
//! The engine itself is pure; everything that touches storage or the rule
//! file goes through these traits, implemented by the adapters crate.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{FiscalProfile, IcmsSimplesMap, Product, Store};
use crate::rules::RuleSet;

/// Error type for ruleset loading
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },
    #[error("Invalid ruleset: {0}")]
    Invalid(String),
}

/// Port for loading the versioned rule table (once, at startup)
#[async_trait]
pub trait RulesRepo: Send + Sync {
    /// Load and validate the full ruleset document
    async fn load(&self) -> Result<RuleSet, RulesError>;
}

/// Error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the product/store catalog.
///
/// The engine reads products and writes back patched profiles; write
/// serialization (transactions, last-write-wins) is the storage side's
/// responsibility.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>, CatalogError>;

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CatalogError>;

    /// Cursor over all products ordered by name. Batches run into the
    /// thousands, so consumers stream instead of materializing the list.
    fn stream_products(&self) -> BoxStream<'_, Result<Product, CatalogError>>;

    /// Persist a profile at the store-scoped slot, or at the legacy slot
    /// when `store_key` is `None`
    async fn save_profile(
        &self,
        product_id: &str,
        store_key: Option<&str>,
        profile: &FiscalProfile,
    ) -> Result<(), CatalogError>;

    /// ICMS-Simples table for one store (code 1-4 to decimal value)
    async fn icms_simples(&self, store_id: &str) -> Result<IcmsSimplesMap, CatalogError>;
}

/// Port for time operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
