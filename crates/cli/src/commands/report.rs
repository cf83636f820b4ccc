//! Report command - compliance listing and per-product review

use anyhow::{Context, Result};
use fiscal_rules_domain::compliance::describe_missing_fields;
use fiscal_rules_domain::report::ComplianceReport;
use fiscal_rules_domain::usecases::{ReportFilter, ReportUseCase};
use std::path::PathBuf;

use crate::args::ReportArgs;
use crate::config::AppConfig;

pub async fn execute(args: ReportArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref()).unwrap_or_default();

    let ruleset = super::load_ruleset(&config.general.rules_path).await?;
    let catalog = super::open_catalog(&config.general.db_path).await?;
    let usecase = ReportUseCase::new(catalog, ruleset);

    let modalidade = args
        .modalidade
        .as_deref()
        .unwrap_or(&config.report.modalidade);
    let filter = ReportFilter::parse(
        Some(modalidade),
        args.status.as_deref(),
        args.search.as_deref(),
    );

    if let Some(product_id) = &args.product {
        let report = usecase.product_report(&args.store, product_id).await?;
        if args.json {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        } else {
            render_report(&report, true);
        }
        return Ok(());
    }

    let page = usecase
        .page(
            &args.store,
            &filter,
            args.page.unwrap_or(1),
            args.limit.unwrap_or(config.report.page_size),
        )
        .await?;

    if args.json {
        let json = serde_json::to_string_pretty(&page).context("Failed to serialize page")?;
        println!("{}", json);
    } else {
        println!(
            "{} produto(s), página {}/{}",
            page.total, page.page, page.pages
        );
        println!();
        for report in &page.reports {
            render_report(report, false);
            println!();
        }
    }

    Ok(())
}

fn render_report(report: &ComplianceReport, detailed: bool) {
    println!("{} [{}]", report.nome, report.product_id);
    println!(
        "  status atual: nfe={} nfce={}",
        report.fiscal_atual.status.nfe, report.fiscal_atual.status.nfce
    );
    println!(
        "  status sugerido: nfe={} nfce={}",
        report.sugestao.fiscal.status.nfe, report.sugestao.fiscal.status.nfce
    );

    let pendentes = describe_missing_fields(&report.pendencias_atuais.comum);
    if !pendentes.is_empty() {
        println!("  pendências comuns: {}", pendentes.join(", "));
    }

    if report.divergencias.is_empty() {
        println!("  sem divergências");
    } else if detailed {
        println!("  divergências:");
        for d in &report.divergencias {
            println!("    - {}: {} -> {}", d.label, d.atual, d.sugerido);
        }
    } else {
        println!("  {} divergência(s)", report.divergencias.len());
    }
}
