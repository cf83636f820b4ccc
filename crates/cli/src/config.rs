//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_modalidade")]
    pub modalidade: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

// Default value functions
fn default_rules_path() -> PathBuf {
    PathBuf::from("./fiscal-rules.json")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./catalog.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_actor() -> String {
    "cli".to_string()
}

fn default_modalidade() -> String {
    "nfe".to_string()
}

fn default_page_size() -> usize {
    20
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            rules_path: default_rules_path(),
            db_path: default_db_path(),
            log_level: default_log_level(),
            max_concurrent: default_max_concurrent(),
            actor: default_actor(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            modalidade: default_modalidade(),
            page_size: default_page_size(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("FISCAL_RULES")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# fiscal-rules configuration

[general]
rules_path = "./fiscal-rules.json"
db_path = "./catalog.sqlite"
log_level = "info"
max_concurrent = 4
# Recorded as atualizadoPor when no --actor is given
actor = "cli"

[report]
modalidade = "nfe"  # nfe, nfce
page_size = 20
"#
        .to_string()
    }
}
