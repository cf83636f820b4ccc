//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fiscal-rules: resolve, review and apply Brazilian fiscal classification rules
#[derive(Parser, Debug)]
#[command(name = "fiscal-rules")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compliance report: current profiles, suggestions and divergences
    Report(ReportArgs),

    /// Apply manual fiscal patches from a JSON batch
    Apply(ApplyArgs),

    /// Resolve and apply the suggested profile for every matching product
    ApplySuggestions(ApplySuggestionsArgs),

    /// Inspect and validate the rule table
    Rules(RulesArgs),

    /// Manage the product/store catalog
    Products(ProductsArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Store to report against
    #[arg(long)]
    pub store: String,

    /// Report a single product instead of a listing page
    #[arg(long)]
    pub product: Option<String>,

    /// Document modality for the status axis (nfe, nfce)
    #[arg(long)]
    pub modalidade: Option<String>,

    /// Filter by current status (pendente, parcial, aprovado)
    #[arg(long)]
    pub status: Option<String>,

    /// Free-text search over name, code and barcode
    #[arg(long)]
    pub search: Option<String>,

    /// Page number (1-based)
    #[arg(long)]
    pub page: Option<usize>,

    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// JSON file with the batch of items (use - for stdin)
    #[arg(long, default_value = "-")]
    pub file: PathBuf,

    /// Recorded as atualizadoPor on every saved profile
    #[arg(long)]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApplySuggestionsArgs {
    /// Store whose suggestions get applied
    #[arg(long)]
    pub store: String,

    /// Document modality for the status filter (nfe, nfce)
    #[arg(long)]
    pub modalidade: Option<String>,

    /// Only apply to products currently in this status
    #[arg(long)]
    pub status: Option<String>,

    /// Free-text search over name, code and barcode
    #[arg(long)]
    pub search: Option<String>,

    /// Recorded as atualizadoPor on every saved profile
    #[arg(long)]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// Show the loaded rule table
    Show {
        /// Override ruleset file
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the ruleset file
    Validate {
        /// Override ruleset file
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct ProductsArgs {
    #[command(subcommand)]
    pub command: ProductsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProductsCommands {
    /// Import a dataset file (stores, products, ICMS-Simples tables)
    Import {
        /// Dataset JSON file
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
