//! Filesystem-based ruleset repository

use async_trait::async_trait;
use fiscal_rules_domain::ports::{RulesError, RulesRepo};
use fiscal_rules_domain::rules::RuleSet;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const KNOWN_REGIMES: [&str; 3] = ["simples", "mei", "normal"];

/// Loads the versioned rule table from a JSON file
pub struct FsRulesRepo {
    path: PathBuf,
    ncm_pattern: Regex,
}

impl FsRulesRepo {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(RulesError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Ruleset file not found: {}", path.display()),
            )));
        }

        let ncm_pattern = Regex::new(r"^[0-9]+$").expect("Valid regex");

        Ok(Self { path, ncm_pattern })
    }

    fn validate(&self, ruleset: &RuleSet) -> Result<(), RulesError> {
        for key in ruleset.ncm_overrides.keys() {
            if !self.ncm_pattern.is_match(key) {
                return Err(RulesError::Invalid(format!(
                    "ncmOverrides key must be digits only: {key:?}"
                )));
            }
        }

        // Unknown regime sections never match a store, so flag them early
        for key in ruleset.regime.keys() {
            if !KNOWN_REGIMES.contains(&key.trim().to_lowercase().as_str()) {
                warn!(regime = %key, "Unknown regime section in ruleset");
            }
        }

        if ruleset.version.trim().is_empty() {
            warn!(path = %self.path.display(), "Ruleset has no version");
        }

        Ok(())
    }
}

#[async_trait]
impl RulesRepo for FsRulesRepo {
    async fn load(&self) -> Result<RuleSet, RulesError> {
        let content = std::fs::read_to_string(&self.path)?;

        let ruleset: RuleSet =
            serde_json::from_str(&content).map_err(|e| RulesError::Parse {
                file: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        self.validate(&ruleset)?;

        info!(
            path = %self.path.display(),
            version = %ruleset.version,
            hash = %ruleset.content_hash(),
            "Loaded ruleset"
        );
        Ok(ruleset)
    }
}
