//! Per-product compliance report: current profile, suggestion, pendencies
//! and the field-level diff between them

use serde::Serialize;

use crate::compliance::{MissingFields, compute_missing_fields};
use crate::diff::{Divergencia, compute_differences};
use crate::model::{FiscalProfile, IcmsSimplesMap, Product, Store, current_profile};
use crate::rules::{RuleSet, build_suggestion};

/// Suggested profile plus the read-only ICMS-Simples side channel
#[derive(Debug, Clone, Serialize)]
pub struct SugestaoFiscal {
    #[serde(flatten)]
    pub fiscal: FiscalProfile,
    #[serde(rename = "icmsSimples", skip_serializing_if = "Option::is_none")]
    pub icms_simples: Option<IcmsSimplesMap>,
}

/// Review report for one product/store pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub product_id: String,
    pub cod: String,
    pub codbarras: String,
    pub nome: String,
    pub ncm: String,
    pub tipo_produto: String,
    pub fiscal_atual: FiscalProfile,
    pub sugestao: SugestaoFiscal,
    pub pendencias_atuais: MissingFields,
    pub pendencias_sugestao: MissingFields,
    pub divergencias: Vec<Divergencia>,
}

/// Build the full review report: resolve the suggestion, evaluate pendencies
/// on both sides and diff current against suggested.
pub fn build_report(
    product: &Product,
    store: &Store,
    ruleset: &RuleSet,
    icms_simples: Option<&IcmsSimplesMap>,
) -> ComplianceReport {
    let fiscal_atual = current_profile(product, &store.id);
    let suggestion = build_suggestion(product, store, ruleset, icms_simples);
    let pendencias_atuais = compute_missing_fields(&fiscal_atual, &store.regime_tributario);
    let divergencias = compute_differences(&fiscal_atual, &suggestion.fiscal);

    ComplianceReport {
        product_id: product.id.clone(),
        cod: product.cod.clone(),
        codbarras: product.codbarras.clone(),
        nome: product.nome.clone(),
        ncm: product.ncm.clone(),
        tipo_produto: product.tipo_produto.clone(),
        fiscal_atual,
        sugestao: SugestaoFiscal {
            fiscal: suggestion.fiscal,
            icms_simples: suggestion.icms_simples,
        },
        pendencias_atuais,
        pendencias_sugestao: suggestion.pendencias,
        divergencias,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FiscalStatus;
    use crate::patch::ProfilePatch;
    use serde_json::json;

    fn ruleset() -> RuleSet {
        serde_json::from_value(json!({
            "version": "test",
            "defaults": {
                "cfop": {
                    "nfe": { "dentroEstado": "5102", "foraEstado": "6102" },
                    "nfce": { "dentroEstado": "5102" },
                },
                "pis": { "codigo": "01", "cst": "01", "aliquota": 1.65 },
                "cofins": { "codigo": "01", "cst": "01", "aliquota": 7.6 },
                "ipi": { "cst": "53", "codigoEnquadramento": "999", "aliquota": 0 },
            },
            "regime": {
                "simples": { "csosn": "102" },
            },
        }))
        .expect("valid ruleset")
    }

    fn store() -> Store {
        Store {
            id: "loja1".to_string(),
            nome: "Loja 1".to_string(),
            regime_tributario: "simples".to_string(),
            uf: "SP".to_string(),
        }
    }

    fn product() -> Product {
        let mut product = Product {
            id: "p1".to_string(),
            cod: "001".to_string(),
            codbarras: "7890000000000".to_string(),
            nome: "Produto Teste".to_string(),
            ncm: "30049099".to_string(),
            tipo_produto: "medicamento".to_string(),
            ..Product::default()
        };
        product.fiscal_por_empresa.insert(
            "loja1".to_string(),
            ProfilePatch::from_value(&json!({
                "csosn": "102",
                "pis": { "codigo": "01", "cst": "01", "aliquota": 1.0 },
            })),
        );
        product
    }

    #[test]
    fn test_report_diffs_current_against_suggestion() {
        let report = build_report(&product(), &store(), &ruleset(), None);

        assert_eq!(report.product_id, "p1");
        // current profile came from the store-scoped slot
        assert_eq!(report.fiscal_atual.pis.aliquota, Some(1.0));
        // suggestion resolved from the rule table
        assert_eq!(report.sugestao.fiscal.pis.aliquota, Some(1.65));
        assert!(
            report
                .divergencias
                .iter()
                .any(|d| d.path == "pis.aliquota")
        );
        // current profile misses its CFOPs, the suggestion does not
        assert!(
            report
                .pendencias_atuais
                .nfe
                .contains(&"cfop.nfe.dentroEstado".to_string())
        );
        assert!(report.pendencias_sugestao.is_empty());
        assert_eq!(report.sugestao.fiscal.status.nfe, FiscalStatus::Aprovado);
    }

    #[test]
    fn test_report_falls_back_to_legacy_profile() {
        let mut product = product();
        product.fiscal_por_empresa.clear();
        product.fiscal = Some(ProfilePatch::from_value(&json!({ "cest": "legacy-cest" })));

        let report = build_report(&product, &store(), &ruleset(), None);
        assert_eq!(report.fiscal_atual.cest, "legacy-cest");
    }

    #[test]
    fn test_icms_simples_rides_along_untouched() {
        let icms: IcmsSimplesMap = [(1, 1.25)].into_iter().collect();
        let report = build_report(&product(), &store(), &ruleset(), Some(&icms));

        assert_eq!(report.sugestao.icms_simples, Some(icms));
        // the side channel never shows up in the diff
        assert!(report.divergencias.iter().all(|d| d.path != "icmsSimples"));

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["sugestao"]["icmsSimples"]["1"], json!(1.25));
    }
}
