//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fiscal_rules_adapters::catalog::SqliteCatalog;
use fiscal_rules_adapters::rules::FsRulesRepo;
use fiscal_rules_domain::ports::RulesRepo;
use fiscal_rules_domain::rules::RuleSet;

pub mod apply;
pub mod config;
pub mod products;
pub mod report;
pub mod rules;

pub(crate) async fn load_ruleset(path: &Path) -> Result<RuleSet> {
    let repo = FsRulesRepo::new(path)
        .with_context(|| format!("Failed to open ruleset: {}", path.display()))?;
    repo.load()
        .await
        .with_context(|| format!("Failed to load ruleset: {}", path.display()))
}

pub(crate) async fn open_catalog(path: &Path) -> Result<Arc<SqliteCatalog>> {
    let catalog = SqliteCatalog::new(path)
        .await
        .with_context(|| format!("Failed to open catalog database: {}", path.display()))?;
    Ok(Arc::new(catalog))
}
