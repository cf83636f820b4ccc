//! Apply commands - manual patch batches and bulk suggestion runs

use anyhow::{Context, Result};
use fiscal_rules_domain::ports::SystemClock;
use fiscal_rules_domain::usecases::{ApplyConfig, ApplyItem, ApplyUseCase, ReportFilter};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::{ApplyArgs, ApplySuggestionsArgs};
use crate::config::AppConfig;

pub async fn execute(args: ApplyArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref()).unwrap_or_default();

    let items = read_items(&args.file)?;
    if items.is_empty() {
        anyhow::bail!("No items to apply");
    }

    let usecase = build_usecase(&config).await?;
    let actor = args.actor.as_deref().unwrap_or(&config.general.actor);

    let outcome = usecase.apply_many(items, actor).await;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?;
        println!("{}", json);
    } else {
        println!("{} atualizado(s)", outcome.updated.len());
        for failure in &outcome.failures {
            println!(
                "  falha [{}]: {}",
                failure.product_id.as_deref().unwrap_or("-"),
                failure.reason
            );
        }
    }

    if !outcome.failures.is_empty() {
        anyhow::bail!("{} item(s) failed", outcome.failures.len());
    }
    Ok(())
}

pub async fn execute_suggestions(
    args: ApplySuggestionsArgs,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref()).unwrap_or_default();

    let usecase = build_usecase(&config).await?;
    let actor = args.actor.as_deref().unwrap_or(&config.general.actor);
    let filter = ReportFilter::parse(
        args.modalidade.as_deref(),
        args.status.as_deref(),
        args.search.as_deref(),
    );

    let outcome = usecase
        .apply_suggestions(&args.store, &filter, actor)
        .await?;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?;
        println!("{}", json);
    } else {
        println!(
            "{} processado(s), {} atualizado(s), {} falha(s)",
            outcome.processed,
            outcome.updated_count,
            outcome.failures.len()
        );
        for failure in &outcome.failures {
            println!(
                "  falha [{}]: {}",
                failure.product_id.as_deref().unwrap_or("-"),
                failure.reason
            );
        }
    }

    Ok(())
}

async fn build_usecase(
    config: &AppConfig,
) -> Result<ApplyUseCase<fiscal_rules_adapters::catalog::SqliteCatalog, SystemClock>> {
    let ruleset = super::load_ruleset(&config.general.rules_path).await?;
    let catalog = super::open_catalog(&config.general.db_path).await?;
    Ok(ApplyUseCase::new(
        catalog,
        ruleset,
        Arc::new(SystemClock),
        ApplyConfig {
            max_concurrent: config.general.max_concurrent,
        },
    ))
}

fn read_items(path: &PathBuf) -> Result<Vec<ApplyItem>> {
    let content = if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read from stdin")?;
        content
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?
    };

    serde_json::from_str(&content).context("Failed to parse apply batch")
}
