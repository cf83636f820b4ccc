//! Products commands - catalog management

use anyhow::{Context, Result};
use fiscal_rules_adapters::catalog::Dataset;
use std::path::PathBuf;

use crate::args::{ProductsArgs, ProductsCommands};
use crate::config::AppConfig;

pub async fn execute(args: ProductsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref()).unwrap_or_default();

    match args.command {
        ProductsCommands::Import { file } => import(&config, &file).await,
    }
}

async fn import(config: &AppConfig, file: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read dataset: {}", file.display()))?;
    let dataset: Dataset =
        serde_json::from_str(&content).context("Failed to parse dataset")?;

    let catalog = super::open_catalog(&config.general.db_path).await?;

    for store in &dataset.stores {
        catalog.upsert_store(store).await?;
    }
    for product in &dataset.products {
        catalog.upsert_product(product).await?;
    }
    let mut icms_entries = 0usize;
    for (store_id, table) in &dataset.icms_simples {
        for (codigo, valor) in table {
            catalog.set_icms_simples(store_id, *codigo, *valor).await?;
            icms_entries += 1;
        }
    }

    println!(
        "Imported {} store(s), {} product(s), {} ICMS-Simples entrie(s) into {}",
        dataset.stores.len(),
        dataset.products.len(),
        icms_entries,
        config.general.db_path.display()
    );
    Ok(())
}
