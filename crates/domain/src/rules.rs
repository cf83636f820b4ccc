//! Versioned rule table and the layered suggestion resolver

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::compliance::{MissingFields, compute_missing_fields, determine_status};
use crate::model::{FiscalProfile, IcmsSimplesMap, Modalidade, Product, StatusPorModalidade, Store};
use crate::patch::ProfilePatch;

/// Immutable rule table with the four override sections.
///
/// Loaded once at startup and passed by reference into the resolver; never a
/// hidden global, so tests can run alternate rulesets side by side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
    pub version: String,
    pub defaults: ProfilePatch,
    pub regime: BTreeMap<String, ProfilePatch>,
    pub tipo_produto: BTreeMap<String, ProfilePatch>,
    pub ncm_overrides: BTreeMap<String, ProfilePatch>,
}

impl RuleSet {
    /// Deterministic SHA-256 of the canonical JSON rendering.
    /// Identifies which rule table produced a suggestion.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A resolved suggestion for one product/store pair
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub fiscal: FiscalProfile,
    pub pendencias: MissingFields,
    /// Side channel attached verbatim; never layered or diffed
    pub icms_simples: Option<IcmsSimplesMap>,
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Resolve the raw suggested profile by layering the four override sources
/// in fixed precedence: defaults < regime < tipoProduto < ncmOverride.
/// Every layer is optional; a missing layer is skipped, never an error.
pub fn resolve(product: &Product, store: &Store, ruleset: &RuleSet) -> FiscalProfile {
    let mut base = ruleset.defaults.clone();

    let regime = store.regime_tributario.trim().to_lowercase();
    if let Some(layer) = ruleset.regime.get(&regime) {
        base.merge(layer);
    }

    let tipo = product.tipo_produto.trim().to_lowercase();
    if !tipo.is_empty() {
        let matched = ruleset
            .tipo_produto
            .iter()
            .find(|(key, _)| key.trim().to_lowercase() == tipo);
        if let Some((_, layer)) = matched {
            base.merge(layer);
        }
    }

    let ncm = digits_only(&product.ncm);
    if !ncm.is_empty() {
        if let Some(layer) = ruleset.ncm_overrides.get(&ncm) {
            base.merge(layer);
        }
    }

    FiscalProfile::from_patch(&base)
}

/// Resolve a suggestion and annotate it with compliance status
pub fn build_suggestion(
    product: &Product,
    store: &Store,
    ruleset: &RuleSet,
    icms_simples: Option<&IcmsSimplesMap>,
) -> Suggestion {
    let mut fiscal = resolve(product, store, ruleset);
    let pendencias = compute_missing_fields(&fiscal, &store.regime_tributario);
    fiscal.status = StatusPorModalidade {
        nfe: determine_status(&pendencias, Modalidade::Nfe),
        nfce: determine_status(&pendencias, Modalidade::Nfce),
    };

    Suggestion {
        fiscal,
        pendencias,
        icms_simples: icms_simples.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FiscalStatus;
    use serde_json::json;

    fn sample_ruleset() -> RuleSet {
        serde_json::from_value(json!({
            "version": "2024-07",
            "defaults": {
                "origem": "0",
                "cfop": {
                    "nfe": { "dentroEstado": "5102", "foraEstado": "6102" },
                    "nfce": { "dentroEstado": "5102" },
                },
                "pis": { "codigo": "01", "cst": "01", "aliquota": 1.65 },
                "cofins": { "codigo": "01", "cst": "01", "aliquota": 7.6 },
                "ipi": { "cst": "53", "codigoEnquadramento": "999", "aliquota": 0 },
            },
            "regime": {
                "simples": {
                    "csosn": "102",
                    "pis": { "cst": "49", "aliquota": 0 },
                    "cofins": { "cst": "49", "aliquota": 0 },
                },
                "normal": { "cst": "00" },
            },
            "tipoProduto": {
                "Medicamento": { "cest": "13.001.00", "cst": "060" },
            },
            "ncmOverrides": {
                "30049099": { "pis": { "cst": "04" }, "cofins": { "cst": "04" } },
            },
        }))
        .expect("valid ruleset")
    }

    fn store(regime: &str) -> Store {
        Store {
            id: "loja1".to_string(),
            nome: "Loja 1".to_string(),
            regime_tributario: regime.to_string(),
            uf: "SP".to_string(),
        }
    }

    #[test]
    fn test_layer_precedence() {
        let ruleset = sample_ruleset();
        let product = Product {
            tipo_produto: "medicamento".to_string(),
            ncm: "3004.90.99".to_string(),
            ..Product::default()
        };

        let resolved = resolve(&product, &store("Simples"), &ruleset);

        // regime beats defaults
        assert_eq!(resolved.pis.aliquota, Some(0.0));
        // tipoProduto layers on top (case-insensitive key match)
        assert_eq!(resolved.cst, "060");
        assert_eq!(resolved.cest, "13.001.00");
        // ncmOverride wins over everything (NCM matched digits-only)
        assert_eq!(resolved.pis.cst, "04");
        // untouched defaults survive
        assert_eq!(resolved.cfop.nfe.dentro_estado, "5102");
    }

    #[test]
    fn test_missing_layers_are_skipped() {
        let ruleset = sample_ruleset();
        let product = Product {
            tipo_produto: "brinquedo".to_string(),
            ncm: "95030031".to_string(),
            ..Product::default()
        };

        let resolved = resolve(&product, &store("mei"), &ruleset);
        assert_eq!(resolved.pis.aliquota, Some(1.65));
        assert_eq!(resolved.cst, "");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let ruleset = sample_ruleset();
        let product = Product {
            tipo_produto: "medicamento".to_string(),
            ncm: "30049099".to_string(),
            ..Product::default()
        };
        let store = store("simples");

        let first = resolve(&product, &store, &ruleset);
        let second = resolve(&product, &store, &ruleset);
        assert_eq!(first, second);
    }

    #[test]
    fn test_suggestion_carries_status_and_side_channel() {
        let ruleset = sample_ruleset();
        let product = Product::default();
        let icms: IcmsSimplesMap = [(1, 1.25), (2, 1.86)].into_iter().collect();

        let suggestion = build_suggestion(&product, &store("simples"), &ruleset, Some(&icms));

        // csosn filled by the regime layer, CFOPs by defaults
        assert_eq!(suggestion.fiscal.status.nfe, FiscalStatus::Aprovado);
        assert_eq!(suggestion.icms_simples, Some(icms));
        assert!(suggestion.pendencias.is_empty());
    }

    #[test]
    fn test_content_hash_is_stable_and_sensitive() {
        let ruleset = sample_ruleset();
        assert_eq!(ruleset.content_hash(), ruleset.content_hash());

        let mut changed = ruleset.clone();
        changed.version = "2024-08".to_string();
        assert_ne!(ruleset.content_hash(), changed.content_hash());
    }
}
