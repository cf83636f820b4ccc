//! Domain models and value objects

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::patch::{
    CfopPatch, CfopPorModalidadePatch, FcpPatch, IpiPatch, ProfilePatch, StatusPatch, TaxPatch,
};

/// Electronic document modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Modalidade {
    /// NF-e: B2B electronic invoice
    #[default]
    Nfe,
    /// NFC-e: point-of-sale consumer invoice
    Nfce,
}

impl FromStr for Modalidade {
    type Err = std::convert::Infallible;

    // Anything that is not explicitly "nfce" is treated as NF-e
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("nfce") {
            Ok(Modalidade::Nfce)
        } else {
            Ok(Modalidade::Nfe)
        }
    }
}

impl fmt::Display for Modalidade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modalidade::Nfe => write!(f, "nfe"),
            Modalidade::Nfce => write!(f, "nfce"),
        }
    }
}

/// Approval status of a classification for one document modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FiscalStatus {
    /// Modality-specific fields are still missing
    #[default]
    Pendente,
    /// Modality fields complete, common fields still missing
    Parcial,
    /// Nothing missing
    Aprovado,
}

impl FiscalStatus {
    /// Coerce an arbitrary JSON value; anything unrecognized is `pendente`
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "parcial" => FiscalStatus::Parcial,
                "aprovado" => FiscalStatus::Aprovado,
                _ => FiscalStatus::Pendente,
            },
            _ => FiscalStatus::Pendente,
        }
    }
}

impl<'de> Deserialize<'de> for FiscalStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl fmt::Display for FiscalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiscalStatus::Pendente => write!(f, "pendente"),
            FiscalStatus::Parcial => write!(f, "parcial"),
            FiscalStatus::Aprovado => write!(f, "aprovado"),
        }
    }
}

impl FromStr for FiscalStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_value(&Value::String(s.to_string())))
    }
}

/// PIS/COFINS configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfig {
    pub codigo: String,
    pub cst: String,
    pub aliquota: Option<f64>,
    pub tipo_calculo: String,
    pub valor_base: Option<f64>,
}

/// IPI configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpiConfig {
    pub cst: String,
    pub codigo_enquadramento: String,
    pub aliquota: Option<f64>,
    pub tipo_calculo: String,
    pub valor_base: Option<f64>,
}

/// CFOP codes for one document modality
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CfopConfig {
    pub dentro_estado: String,
    pub fora_estado: String,
    pub transferencia: String,
    pub devolucao: String,
    pub industrializacao: String,
}

/// CFOP codes per document modality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfopPorModalidade {
    pub nfe: CfopConfig,
    pub nfce: CfopConfig,
}

/// FCP (poverty-fighting fund) configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcpConfig {
    pub indicador: String,
    pub aliquota: Option<f64>,
    pub aplica: bool,
}

/// Approval status per document modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct StatusPorModalidade {
    pub nfe: FiscalStatus,
    pub nfce: FiscalStatus,
}

impl StatusPorModalidade {
    pub fn get(&self, modalidade: Modalidade) -> FiscalStatus {
        match modalidade {
            Modalidade::Nfe => self.nfe,
            Modalidade::Nfce => self.nfce,
        }
    }
}

/// Canonical fiscal classification of a product for one store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalProfile {
    pub origem: String,
    pub cest: String,
    pub csosn: String,
    pub cst: String,
    pub cfop: CfopPorModalidade,
    pub pis: TaxConfig,
    pub cofins: TaxConfig,
    pub ipi: IpiConfig,
    pub fcp: FcpConfig,
    pub status: StatusPorModalidade,
    #[serde(with = "time::serde::rfc3339::option")]
    pub atualizado_em: Option<OffsetDateTime>,
    pub atualizado_por: String,
}

fn non_empty_or(value: Option<&String>, fallback: &str) -> String {
    match value {
        Some(s) if !s.is_empty() => s.clone(),
        _ => fallback.to_string(),
    }
}

fn or_empty(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

fn tax_from_patch(patch: Option<&TaxPatch>) -> TaxConfig {
    let patch = patch.cloned().unwrap_or_default();
    TaxConfig {
        codigo: patch.codigo.unwrap_or_default(),
        cst: patch.cst.unwrap_or_default(),
        aliquota: patch.aliquota,
        tipo_calculo: non_empty_or(patch.tipo_calculo.as_ref(), "percentual"),
        valor_base: patch.valor_base,
    }
}

fn ipi_from_patch(patch: Option<&IpiPatch>) -> IpiConfig {
    let patch = patch.cloned().unwrap_or_default();
    IpiConfig {
        cst: patch.cst.unwrap_or_default(),
        codigo_enquadramento: patch.codigo_enquadramento.unwrap_or_default(),
        aliquota: patch.aliquota,
        tipo_calculo: non_empty_or(patch.tipo_calculo.as_ref(), "percentual"),
        valor_base: patch.valor_base,
    }
}

fn cfop_from_patch(patch: Option<&CfopPatch>) -> CfopConfig {
    let patch = patch.cloned().unwrap_or_default();
    CfopConfig {
        dentro_estado: patch.dentro_estado.unwrap_or_default(),
        fora_estado: patch.fora_estado.unwrap_or_default(),
        transferencia: patch.transferencia.unwrap_or_default(),
        devolucao: patch.devolucao.unwrap_or_default(),
        industrializacao: patch.industrializacao.unwrap_or_default(),
    }
}

fn fcp_from_patch(patch: Option<&FcpPatch>) -> FcpConfig {
    let patch = patch.cloned().unwrap_or_default();
    FcpConfig {
        indicador: non_empty_or(patch.indicador.as_ref(), "0"),
        aliquota: patch.aliquota,
        aplica: patch.aplica.unwrap_or(false),
    }
}

impl FiscalProfile {
    /// Materialize a partial profile, filling canonical defaults
    pub fn from_patch(patch: &ProfilePatch) -> Self {
        let cfop = patch.cfop.clone().unwrap_or_default();
        let status = patch.status.clone().unwrap_or_default();
        Self {
            origem: non_empty_or(patch.origem.as_ref(), "0"),
            cest: or_empty(patch.cest.as_ref()),
            csosn: or_empty(patch.csosn.as_ref()),
            cst: or_empty(patch.cst.as_ref()),
            cfop: CfopPorModalidade {
                nfe: cfop_from_patch(cfop.nfe.as_ref()),
                nfce: cfop_from_patch(cfop.nfce.as_ref()),
            },
            pis: tax_from_patch(patch.pis.as_ref()),
            cofins: tax_from_patch(patch.cofins.as_ref()),
            ipi: ipi_from_patch(patch.ipi.as_ref()),
            fcp: fcp_from_patch(patch.fcp.as_ref()),
            status: StatusPorModalidade {
                nfe: status.nfe.unwrap_or_default(),
                nfce: status.nfce.unwrap_or_default(),
            },
            atualizado_em: patch.atualizado_em,
            atualizado_por: or_empty(patch.atualizado_por.as_ref()),
        }
    }

    /// Express this profile as a fully-populated patch
    pub fn to_patch(&self) -> ProfilePatch {
        fn cfop(config: &CfopConfig) -> CfopPatch {
            CfopPatch {
                dentro_estado: Some(config.dentro_estado.clone()),
                fora_estado: Some(config.fora_estado.clone()),
                transferencia: Some(config.transferencia.clone()),
                devolucao: Some(config.devolucao.clone()),
                industrializacao: Some(config.industrializacao.clone()),
            }
        }
        fn tax(config: &TaxConfig) -> TaxPatch {
            TaxPatch {
                codigo: Some(config.codigo.clone()),
                cst: Some(config.cst.clone()),
                aliquota: config.aliquota,
                tipo_calculo: Some(config.tipo_calculo.clone()),
                valor_base: config.valor_base,
            }
        }
        ProfilePatch {
            origem: Some(self.origem.clone()),
            cest: Some(self.cest.clone()),
            csosn: Some(self.csosn.clone()),
            cst: Some(self.cst.clone()),
            cfop: Some(CfopPorModalidadePatch {
                nfe: Some(cfop(&self.cfop.nfe)),
                nfce: Some(cfop(&self.cfop.nfce)),
            }),
            pis: Some(tax(&self.pis)),
            cofins: Some(tax(&self.cofins)),
            ipi: Some(IpiPatch {
                cst: Some(self.ipi.cst.clone()),
                codigo_enquadramento: Some(self.ipi.codigo_enquadramento.clone()),
                aliquota: self.ipi.aliquota,
                tipo_calculo: Some(self.ipi.tipo_calculo.clone()),
                valor_base: self.ipi.valor_base,
            }),
            fcp: Some(FcpPatch {
                indicador: Some(self.fcp.indicador.clone()),
                aliquota: self.fcp.aliquota,
                aplica: Some(self.fcp.aplica),
            }),
            status: Some(StatusPatch {
                nfe: Some(self.status.nfe),
                nfce: Some(self.status.nfce),
            }),
            atualizado_em: self.atualizado_em,
            atualizado_por: Some(self.atualizado_por.clone()),
        }
    }

    /// Merge an accepted patch on top of this profile and re-normalize
    pub fn apply_patch(&self, patch: &ProfilePatch) -> FiscalProfile {
        let mut base = self.to_patch();
        base.merge(patch);
        FiscalProfile::from_patch(&base)
    }
}

impl Default for FiscalProfile {
    fn default() -> Self {
        FiscalProfile::from_patch(&ProfilePatch::default())
    }
}

/// Coerce arbitrary JSON into a canonical fiscal profile.
///
/// Total and idempotent: `null`, partial objects and malformed leaves all
/// degrade to defaults instead of erroring.
pub fn normalize(raw: &Value) -> FiscalProfile {
    FiscalProfile::from_patch(&ProfilePatch::from_value(raw))
}

/// ICMS-Simples side channel: small integer code (1-4) to decimal value.
/// Read-only context attached to suggestions, never layered or diffed.
pub type IcmsSimplesMap = BTreeMap<u8, f64>;

/// Store subset consumed by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Store {
    #[serde(rename = "_id")]
    pub id: String,
    pub nome: String,
    pub regime_tributario: String,
    pub uf: String,
}

/// Product subset consumed by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub cod: String,
    pub codbarras: String,
    pub nome: String,
    pub ncm: String,
    pub tipo_produto: String,
    /// Legacy single-profile slot, superseded by `fiscal_por_empresa`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal: Option<ProfilePatch>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fiscal_por_empresa: BTreeMap<String, ProfilePatch>,
}

/// Two-step profile lookup: the store-scoped entry wins; the legacy `fiscal`
/// slot is a documented compatibility fallback for products classified before
/// per-store profiles existed.
pub fn profile_for_store<'a>(product: &'a Product, store_key: &str) -> Option<&'a ProfilePatch> {
    if !store_key.is_empty() {
        if let Some(patch) = product.fiscal_por_empresa.get(store_key) {
            return Some(patch);
        }
    }
    product.fiscal.as_ref()
}

/// Normalized current profile of a product for one store
pub fn current_profile(product: &Product, store_key: &str) -> FiscalProfile {
    let patch = profile_for_store(product, store_key)
        .cloned()
        .unwrap_or_default();
    FiscalProfile::from_patch(&patch)
}
