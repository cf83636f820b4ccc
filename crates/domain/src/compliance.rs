//! Required-field evaluation and the 3-tier approval status

use serde::Serialize;

use crate::diff::label_for;
use crate::model::{FiscalProfile, FiscalStatus, Modalidade};

/// Field paths still missing from a profile, per document type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingFields {
    pub comum: Vec<String>,
    pub nfe: Vec<String>,
    pub nfce: Vec<String>,
}

impl MissingFields {
    pub fn for_modalidade(&self, modalidade: Modalidade) -> &[String] {
        match modalidade {
            Modalidade::Nfe => &self.nfe,
            Modalidade::Nfce => &self.nfce,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.comum.is_empty() && self.nfe.is_empty() && self.nfce.is_empty()
    }
}

fn push_if_empty(missing: &mut Vec<String>, path: &str, value: &str) {
    if value.is_empty() {
        missing.push(path.to_string());
    }
}

fn push_if_null(missing: &mut Vec<String>, path: &str, value: Option<f64>) {
    if value.is_none() {
        missing.push(path.to_string());
    }
}

/// Compute the ordered lists of missing required fields.
///
/// The common list covers origin, PIS/COFINS code+CST, IPI CST+framing code
/// and the three rates (a rate of zero is valid, only a missing rate counts).
/// The regime decides the ICMS situation code: `normal` requires `cst`,
/// everything else requires `csosn`. CFOP requirements are per modality.
pub fn compute_missing_fields(profile: &FiscalProfile, regime: &str) -> MissingFields {
    let mut comum = Vec::new();
    push_if_empty(&mut comum, "origem", &profile.origem);
    push_if_empty(&mut comum, "pis.codigo", &profile.pis.codigo);
    push_if_empty(&mut comum, "pis.cst", &profile.pis.cst);
    push_if_empty(&mut comum, "cofins.codigo", &profile.cofins.codigo);
    push_if_empty(&mut comum, "cofins.cst", &profile.cofins.cst);
    push_if_empty(&mut comum, "ipi.cst", &profile.ipi.cst);
    push_if_empty(
        &mut comum,
        "ipi.codigoEnquadramento",
        &profile.ipi.codigo_enquadramento,
    );
    push_if_null(&mut comum, "pis.aliquota", profile.pis.aliquota);
    push_if_null(&mut comum, "cofins.aliquota", profile.cofins.aliquota);
    push_if_null(&mut comum, "ipi.aliquota", profile.ipi.aliquota);

    let mut nfe = Vec::new();
    push_if_empty(&mut nfe, "cfop.nfe.dentroEstado", &profile.cfop.nfe.dentro_estado);
    push_if_empty(&mut nfe, "cfop.nfe.foraEstado", &profile.cfop.nfe.fora_estado);

    let mut nfce = Vec::new();
    push_if_empty(
        &mut nfce,
        "cfop.nfce.dentroEstado",
        &profile.cfop.nfce.dentro_estado,
    );

    if regime.trim().eq_ignore_ascii_case("normal") {
        push_if_empty(&mut comum, "cst", &profile.cst);
    } else {
        push_if_empty(&mut comum, "csosn", &profile.csosn);
    }

    MissingFields { comum, nfe, nfce }
}

/// Status law: `aprovado` iff nothing is missing for the modality nor in the
/// common list; `parcial` iff only common fields are missing; `pendente`
/// whenever any modality-specific field is missing.
pub fn determine_status(missing: &MissingFields, modalidade: Modalidade) -> FiscalStatus {
    let modal_empty = missing.for_modalidade(modalidade).is_empty();
    match (modal_empty, missing.comum.is_empty()) {
        (true, true) => FiscalStatus::Aprovado,
        (true, false) => FiscalStatus::Parcial,
        (false, _) => FiscalStatus::Pendente,
    }
}

/// Human-readable labels for a list of missing field paths
pub fn describe_missing_fields(paths: &[String]) -> Vec<String> {
    paths.iter().map(|path| label_for(path).to_string()).collect()
}
