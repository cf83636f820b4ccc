//! Rules commands - rule table inspection and validation

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::args::{RulesArgs, RulesCommands};
use crate::config::AppConfig;

pub async fn execute(args: RulesArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref()).unwrap_or_default();

    match args.command {
        RulesCommands::Show { rules, json } => {
            let path = rules.unwrap_or(config.general.rules_path);
            show(&path, json).await
        }
        RulesCommands::Validate { rules } => {
            let path = rules.unwrap_or(config.general.rules_path);
            super::load_ruleset(&path)
                .await
                .context("Validation failed")?;
            println!("Ruleset OK: {}", path.display());
            Ok(())
        }
    }
}

async fn show(path: &std::path::Path, json: bool) -> Result<()> {
    let ruleset = super::load_ruleset(path).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&ruleset).context("Failed to serialize ruleset")?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Ruleset: {}", path.display());
    println!("  version: {}", ruleset.version);
    println!("  hash: {}", ruleset.content_hash());
    println!("  regime sections: {}", ruleset.regime.len());
    println!("  tipoProduto sections: {}", ruleset.tipo_produto.len());
    println!("  ncmOverrides: {}", ruleset.ncm_overrides.len());
    Ok(())
}
