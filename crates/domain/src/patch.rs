//! Partial fiscal shapes used by rule layers and accepted patches
//!
//! Every field is optional and deserialized leniently: numbers accept JSON
//! numbers or numeric strings (anything else becomes absent, never an error),
//! strings accept strings or numbers and are trimmed, booleans are coerced by
//! truthiness. Merging is typed per shape: nested objects merge field by
//! field, scalars are replaced wholesale by the later layer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::model::FiscalStatus;

/// Coerce a JSON value into a trimmed string, if it carries one
pub(crate) fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerce a JSON value into a finite number, if it carries one
pub(crate) fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Coerce a JSON value into a boolean by truthiness
pub(crate) fn coerce_flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(s) => Some(!s.trim().is_empty()),
        _ => None,
    }
}

/// Coerce a JSON value into a timestamp (RFC 3339 strings only)
pub(crate) fn coerce_datetime(value: Option<&Value>) -> Option<OffsetDateTime> {
    match value? {
        Value::String(s) => OffsetDateTime::parse(s.trim(), &Rfc3339).ok(),
        _ => None,
    }
}

fn coerce_status(value: Option<&Value>) -> Option<FiscalStatus> {
    value.map(FiscalStatus::from_value)
}

/// Replace the destination scalar when the source carries a value
fn overwrite<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if src.is_some() {
        dst.clone_from(src);
    }
}

/// Merge an optional nested shape field by field
fn merge_nested<T: Clone + MergePatch>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(src) = src {
        match dst {
            Some(dst) => dst.merge(src),
            None => *dst = Some(src.clone()),
        }
    }
}

trait MergePatch {
    fn merge(&mut self, other: &Self);
}

/// Partial PIS/COFINS configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliquota: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_calculo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_base: Option<f64>,
}

impl TaxPatch {
    pub fn from_value(value: &Value) -> Self {
        Self {
            codigo: coerce_string(value.get("codigo")),
            cst: coerce_string(value.get("cst")),
            aliquota: coerce_number(value.get("aliquota")),
            tipo_calculo: coerce_string(value.get("tipoCalculo")),
            valor_base: coerce_number(value.get("valorBase")),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overwrite(&mut self.codigo, &other.codigo);
        overwrite(&mut self.cst, &other.cst);
        overwrite(&mut self.aliquota, &other.aliquota);
        overwrite(&mut self.tipo_calculo, &other.tipo_calculo);
        overwrite(&mut self.valor_base, &other.valor_base);
    }
}

/// Partial IPI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpiPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo_enquadramento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliquota: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_calculo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_base: Option<f64>,
}

impl IpiPatch {
    pub fn from_value(value: &Value) -> Self {
        Self {
            cst: coerce_string(value.get("cst")),
            codigo_enquadramento: coerce_string(value.get("codigoEnquadramento")),
            aliquota: coerce_number(value.get("aliquota")),
            tipo_calculo: coerce_string(value.get("tipoCalculo")),
            valor_base: coerce_number(value.get("valorBase")),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overwrite(&mut self.cst, &other.cst);
        overwrite(&mut self.codigo_enquadramento, &other.codigo_enquadramento);
        overwrite(&mut self.aliquota, &other.aliquota);
        overwrite(&mut self.tipo_calculo, &other.tipo_calculo);
        overwrite(&mut self.valor_base, &other.valor_base);
    }
}

/// Partial CFOP codes for one document modality
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CfopPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dentro_estado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fora_estado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transferencia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devolucao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industrializacao: Option<String>,
}

impl CfopPatch {
    pub fn from_value(value: &Value) -> Self {
        Self {
            dentro_estado: coerce_string(value.get("dentroEstado")),
            fora_estado: coerce_string(value.get("foraEstado")),
            transferencia: coerce_string(value.get("transferencia")),
            devolucao: coerce_string(value.get("devolucao")),
            industrializacao: coerce_string(value.get("industrializacao")),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overwrite(&mut self.dentro_estado, &other.dentro_estado);
        overwrite(&mut self.fora_estado, &other.fora_estado);
        overwrite(&mut self.transferencia, &other.transferencia);
        overwrite(&mut self.devolucao, &other.devolucao);
        overwrite(&mut self.industrializacao, &other.industrializacao);
    }
}

impl MergePatch for CfopPatch {
    fn merge(&mut self, other: &Self) {
        CfopPatch::merge(self, other);
    }
}

/// Partial CFOP codes per document modality (NF-e / NFC-e)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CfopPorModalidadePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfe: Option<CfopPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfce: Option<CfopPatch>,
}

impl CfopPorModalidadePatch {
    pub fn from_value(value: &Value) -> Self {
        Self {
            nfe: value.get("nfe").map(CfopPatch::from_value),
            nfce: value.get("nfce").map(CfopPatch::from_value),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        merge_nested(&mut self.nfe, &other.nfe);
        merge_nested(&mut self.nfce, &other.nfce);
    }
}

impl MergePatch for CfopPorModalidadePatch {
    fn merge(&mut self, other: &Self) {
        CfopPorModalidadePatch::merge(self, other);
    }
}

/// Partial FCP configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FcpPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicador: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliquota: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aplica: Option<bool>,
}

impl FcpPatch {
    pub fn from_value(value: &Value) -> Self {
        Self {
            indicador: coerce_string(value.get("indicador")),
            aliquota: coerce_number(value.get("aliquota")),
            aplica: coerce_flag(value.get("aplica")),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overwrite(&mut self.indicador, &other.indicador);
        overwrite(&mut self.aliquota, &other.aliquota);
        overwrite(&mut self.aplica, &other.aplica);
    }
}

impl MergePatch for FcpPatch {
    fn merge(&mut self, other: &Self) {
        FcpPatch::merge(self, other);
    }
}

/// Partial approval status per document modality
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfe: Option<FiscalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfce: Option<FiscalStatus>,
}

impl StatusPatch {
    pub fn from_value(value: &Value) -> Self {
        Self {
            nfe: coerce_status(value.get("nfe")),
            nfce: coerce_status(value.get("nfce")),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overwrite(&mut self.nfe, &other.nfe);
        overwrite(&mut self.nfce, &other.nfce);
    }
}

impl MergePatch for StatusPatch {
    fn merge(&mut self, other: &Self) {
        StatusPatch::merge(self, other);
    }
}

impl MergePatch for TaxPatch {
    fn merge(&mut self, other: &Self) {
        TaxPatch::merge(self, other);
    }
}

impl MergePatch for IpiPatch {
    fn merge(&mut self, other: &Self) {
        IpiPatch::merge(self, other);
    }
}

/// Partial fiscal profile: a rule layer or an accepted patch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csosn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfop: Option<CfopPorModalidadePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pis: Option<TaxPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cofins: Option<TaxPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipi: Option<IpiPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcp: Option<FcpPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusPatch>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option",
        default
    )]
    pub atualizado_em: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atualizado_por: Option<String>,
}

impl ProfilePatch {
    /// Read a patch out of arbitrary JSON. Total: any non-object input yields
    /// an empty patch, malformed leaves are dropped rather than rejected.
    pub fn from_value(value: &Value) -> Self {
        Self {
            origem: coerce_string(value.get("origem")),
            cest: coerce_string(value.get("cest")),
            csosn: coerce_string(value.get("csosn")),
            cst: coerce_string(value.get("cst")),
            cfop: value.get("cfop").map(CfopPorModalidadePatch::from_value),
            pis: value.get("pis").map(TaxPatch::from_value),
            cofins: value.get("cofins").map(TaxPatch::from_value),
            ipi: value.get("ipi").map(IpiPatch::from_value),
            fcp: value.get("fcp").map(FcpPatch::from_value),
            status: value.get("status").map(StatusPatch::from_value),
            atualizado_em: coerce_datetime(value.get("atualizadoEm")),
            atualizado_por: coerce_string(value.get("atualizadoPor")),
        }
    }

    /// Layer another patch on top of this one (later layer wins)
    pub fn merge(&mut self, other: &Self) {
        overwrite(&mut self.origem, &other.origem);
        overwrite(&mut self.cest, &other.cest);
        overwrite(&mut self.csosn, &other.csosn);
        overwrite(&mut self.cst, &other.cst);
        merge_nested(&mut self.cfop, &other.cfop);
        merge_nested(&mut self.pis, &other.pis);
        merge_nested(&mut self.cofins, &other.cofins);
        merge_nested(&mut self.ipi, &other.ipi);
        merge_nested(&mut self.fcp, &other.fcp);
        merge_nested(&mut self.status, &other.status);
        overwrite(&mut self.atualizado_em, &other.atualizado_em);
        overwrite(&mut self.atualizado_por, &other.atualizado_por);
    }
}

impl<'de> Deserialize<'de> for ProfilePatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_coerces_leniently() {
        let patch = ProfilePatch::from_value(&json!({
            "origem": "  2 ",
            "cest": 1300100,
            "pis": { "codigo": "01", "aliquota": "1.65", "valorBase": "abc" },
            "fcp": { "aplica": 1 },
        }));

        assert_eq!(patch.origem.as_deref(), Some("2"));
        assert_eq!(patch.cest.as_deref(), Some("1300100"));
        let pis = patch.pis.unwrap();
        assert_eq!(pis.aliquota, Some(1.65));
        assert_eq!(pis.valor_base, None);
        assert_eq!(patch.fcp.unwrap().aplica, Some(true));
    }

    #[test]
    fn test_from_value_is_total_over_garbage() {
        assert_eq!(ProfilePatch::from_value(&json!(null)), ProfilePatch::default());
        assert_eq!(ProfilePatch::from_value(&json!("oops")), ProfilePatch::default());
        assert_eq!(ProfilePatch::from_value(&json!([1, 2])), ProfilePatch::default());

        // A garbage nested object still keeps the valid siblings
        let patch = ProfilePatch::from_value(&json!({ "origem": "1", "cfop": "broken" }));
        assert_eq!(patch.origem.as_deref(), Some("1"));
        assert_eq!(patch.cfop, Some(CfopPorModalidadePatch::default()));
    }

    #[test]
    fn test_merge_scalars_replace_objects_merge() {
        let mut base = ProfilePatch::from_value(&json!({
            "cst": "00",
            "pis": { "codigo": "01", "aliquota": 1.65 },
        }));
        let layer = ProfilePatch::from_value(&json!({
            "cst": "060",
            "pis": { "aliquota": 0 },
        }));

        base.merge(&layer);

        assert_eq!(base.cst.as_deref(), Some("060"));
        let pis = base.pis.unwrap();
        // codigo survives the merge, aliquota is replaced
        assert_eq!(pis.codigo.as_deref(), Some("01"));
        assert_eq!(pis.aliquota, Some(0.0));
    }

    #[test]
    fn test_merge_keeps_base_when_layer_is_silent() {
        let mut base = ProfilePatch::from_value(&json!({ "csosn": "102" }));
        base.merge(&ProfilePatch::default());
        assert_eq!(base.csosn.as_deref(), Some("102"));
    }
}
