//! Fiscal rule engine: layered suggestion resolution, compliance evaluation
//! and batch application of Brazilian fiscal classifications.
//!
//! The crate is storage-agnostic. Everything stateful goes through the ports
//! in [`ports`]; the use cases in [`usecases`] wire the pure engine to them.

pub mod compliance;
pub mod diff;
pub mod model;
pub mod patch;
pub mod ports;
pub mod report;
pub mod rules;
pub mod usecases;

pub use compliance::{
    MissingFields, compute_missing_fields, describe_missing_fields, determine_status,
};
pub use diff::{DIFF_FIELDS, Divergencia, compute_differences, label_for};
pub use model::{
    FiscalProfile, FiscalStatus, IcmsSimplesMap, Modalidade, Product, Store, current_profile,
    normalize, profile_for_store,
};
pub use patch::ProfilePatch;
pub use ports::{Catalog, CatalogError, Clock, RulesError, RulesRepo, SystemClock};
pub use report::{ComplianceReport, build_report};
pub use rules::{RuleSet, Suggestion, build_suggestion, resolve};
pub use usecases::{
    ApplyConfig, ApplyItem, ApplyOutcome, ApplyUseCase, ReportFilter, ReportPage, ReportUseCase,
    SuggestionApplyOutcome,
};
