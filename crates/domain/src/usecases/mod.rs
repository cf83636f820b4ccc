//! Application use cases

pub mod apply;
pub mod report;

pub use apply::{
    ApplyConfig, ApplyError, ApplyItem, ApplyOutcome, ApplyUseCase, SuggestionApplyOutcome,
};
pub use report::{ReportError, ReportFilter, ReportPage, ReportUseCase};
