//! Field-level diff between the current classification and a suggestion
//!
//! The diffed paths and their order are fixed: the review UI renders rows in
//! this order and tests rely on it, so the table is never sorted or filtered
//! beyond dropping equal fields.

use serde::Serialize;
use serde_json::Value;

use crate::model::FiscalProfile;

/// One divergent field between current and suggested profiles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divergencia {
    pub path: String,
    pub label: String,
    pub atual: Value,
    pub sugerido: Value,
}

/// Fixed, ordered list of diffable leaf paths
pub const DIFF_FIELDS: [&str; 29] = [
    "origem",
    "cest",
    "csosn",
    "cst",
    "cfop.nfe.dentroEstado",
    "cfop.nfe.foraEstado",
    "cfop.nfe.transferencia",
    "cfop.nfe.devolucao",
    "cfop.nfe.industrializacao",
    "cfop.nfce.dentroEstado",
    "cfop.nfce.foraEstado",
    "cfop.nfce.transferencia",
    "cfop.nfce.devolucao",
    "cfop.nfce.industrializacao",
    "pis.codigo",
    "pis.cst",
    "pis.aliquota",
    "pis.tipoCalculo",
    "cofins.codigo",
    "cofins.cst",
    "cofins.aliquota",
    "cofins.tipoCalculo",
    "ipi.cst",
    "ipi.codigoEnquadramento",
    "ipi.aliquota",
    "ipi.tipoCalculo",
    "fcp.indicador",
    "fcp.aliquota",
    "fcp.aplica",
];

const RATE_EPSILON: f64 = 0.0001;

/// Human-readable label for a diffable or required field path
pub fn label_for(path: &str) -> &str {
    match path {
        "origem" => "Origem da mercadoria",
        "cest" => "CEST",
        "csosn" => "CSOSN",
        "cst" => "CST",
        "cfop.nfe.dentroEstado" => "CFOP NF-e dentro do estado",
        "cfop.nfe.foraEstado" => "CFOP NF-e fora do estado",
        "cfop.nfe.transferencia" => "CFOP NF-e transferência",
        "cfop.nfe.devolucao" => "CFOP NF-e devolução",
        "cfop.nfe.industrializacao" => "CFOP NF-e industrialização",
        "cfop.nfce.dentroEstado" => "CFOP NFC-e dentro do estado",
        "cfop.nfce.foraEstado" => "CFOP NFC-e fora do estado",
        "cfop.nfce.transferencia" => "CFOP NFC-e transferência",
        "cfop.nfce.devolucao" => "CFOP NFC-e devolução",
        "cfop.nfce.industrializacao" => "CFOP NFC-e industrialização",
        "pis.codigo" => "PIS código",
        "pis.cst" => "PIS CST",
        "pis.aliquota" => "PIS alíquota",
        "pis.tipoCalculo" => "PIS tipo de cálculo",
        "cofins.codigo" => "COFINS código",
        "cofins.cst" => "COFINS CST",
        "cofins.aliquota" => "COFINS alíquota",
        "cofins.tipoCalculo" => "COFINS tipo de cálculo",
        "ipi.cst" => "IPI CST",
        "ipi.codigoEnquadramento" => "IPI enquadramento",
        "ipi.aliquota" => "IPI alíquota",
        "ipi.tipoCalculo" => "IPI tipo de cálculo",
        "fcp.indicador" => "FCP indicador",
        "fcp.aliquota" => "FCP alíquota",
        "fcp.aplica" => "FCP aplicado",
        other => other,
    }
}

/// Typed view of a single diffable leaf
#[derive(Debug, Clone, PartialEq)]
enum FieldValue<'a> {
    Text(&'a str),
    Number(Option<f64>),
    Flag(bool),
}

impl FieldValue<'_> {
    fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String((*s).to_string()),
            FieldValue::Number(Some(n)) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Number(None) => Value::Null,
            FieldValue::Flag(b) => Value::Bool(*b),
        }
    }
}

fn field_value<'a>(profile: &'a FiscalProfile, path: &str) -> FieldValue<'a> {
    match path {
        "origem" => FieldValue::Text(&profile.origem),
        "cest" => FieldValue::Text(&profile.cest),
        "csosn" => FieldValue::Text(&profile.csosn),
        "cst" => FieldValue::Text(&profile.cst),
        "cfop.nfe.dentroEstado" => FieldValue::Text(&profile.cfop.nfe.dentro_estado),
        "cfop.nfe.foraEstado" => FieldValue::Text(&profile.cfop.nfe.fora_estado),
        "cfop.nfe.transferencia" => FieldValue::Text(&profile.cfop.nfe.transferencia),
        "cfop.nfe.devolucao" => FieldValue::Text(&profile.cfop.nfe.devolucao),
        "cfop.nfe.industrializacao" => FieldValue::Text(&profile.cfop.nfe.industrializacao),
        "cfop.nfce.dentroEstado" => FieldValue::Text(&profile.cfop.nfce.dentro_estado),
        "cfop.nfce.foraEstado" => FieldValue::Text(&profile.cfop.nfce.fora_estado),
        "cfop.nfce.transferencia" => FieldValue::Text(&profile.cfop.nfce.transferencia),
        "cfop.nfce.devolucao" => FieldValue::Text(&profile.cfop.nfce.devolucao),
        "cfop.nfce.industrializacao" => FieldValue::Text(&profile.cfop.nfce.industrializacao),
        "pis.codigo" => FieldValue::Text(&profile.pis.codigo),
        "pis.cst" => FieldValue::Text(&profile.pis.cst),
        "pis.aliquota" => FieldValue::Number(profile.pis.aliquota),
        "pis.tipoCalculo" => FieldValue::Text(&profile.pis.tipo_calculo),
        "cofins.codigo" => FieldValue::Text(&profile.cofins.codigo),
        "cofins.cst" => FieldValue::Text(&profile.cofins.cst),
        "cofins.aliquota" => FieldValue::Number(profile.cofins.aliquota),
        "cofins.tipoCalculo" => FieldValue::Text(&profile.cofins.tipo_calculo),
        "ipi.cst" => FieldValue::Text(&profile.ipi.cst),
        "ipi.codigoEnquadramento" => FieldValue::Text(&profile.ipi.codigo_enquadramento),
        "ipi.aliquota" => FieldValue::Number(profile.ipi.aliquota),
        "ipi.tipoCalculo" => FieldValue::Text(&profile.ipi.tipo_calculo),
        "fcp.indicador" => FieldValue::Text(&profile.fcp.indicador),
        "fcp.aliquota" => FieldValue::Number(profile.fcp.aliquota),
        "fcp.aplica" => FieldValue::Flag(profile.fcp.aplica),
        _ => FieldValue::Text(""),
    }
}

/// Numbers differ when exactly one is absent, or both are present and more
/// than `RATE_EPSILON` apart. Flags compare by truth value, text as trimmed
/// strings.
fn differs(current: &FieldValue<'_>, suggested: &FieldValue<'_>) -> bool {
    match (current, suggested) {
        (FieldValue::Number(a), FieldValue::Number(b)) => match (a, b) {
            (None, None) => false,
            (Some(a), Some(b)) => (a - b).abs() > RATE_EPSILON,
            _ => true,
        },
        (FieldValue::Flag(a), FieldValue::Flag(b)) => a != b,
        (FieldValue::Text(a), FieldValue::Text(b)) => a.trim() != b.trim(),
        // Paths always resolve to the same variant on both sides
        _ => true,
    }
}

/// Compute the ordered list of divergent fields between two profiles
pub fn compute_differences(current: &FiscalProfile, suggested: &FiscalProfile) -> Vec<Divergencia> {
    DIFF_FIELDS
        .iter()
        .filter_map(|path| {
            let atual = field_value(current, path);
            let sugerido = field_value(suggested, path);
            differs(&atual, &sugerido).then(|| Divergencia {
                path: (*path).to_string(),
                label: label_for(path).to_string(),
                atual: atual.to_json(),
                sugerido: sugerido.to_json(),
            })
        })
        .collect()
}
