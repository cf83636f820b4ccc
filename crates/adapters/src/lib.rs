//! fiscal-rules adapters crate
//!
//! Infrastructure adapters implementing the domain ports:
//! - `rules`: Filesystem-based ruleset loader
//! - `catalog`: SQLite and in-memory product/store catalogs

mod catalog_memory;
mod catalog_sqlite;
mod rules_fs;

/// Re-exports for ruleset adapters
pub mod rules {
    pub use crate::rules_fs::FsRulesRepo;
}

/// Re-exports for catalog adapters
pub mod catalog {
    pub use crate::catalog_memory::{Dataset, InMemoryCatalog};
    pub use crate::catalog_sqlite::SqliteCatalog;
}
