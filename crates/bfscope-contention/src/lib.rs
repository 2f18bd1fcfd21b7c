//! Backfill-contention analysis.
//!
//! Given a [`SnapshotSource`](bfscope_core::SnapshotSource), a tenant and a
//! time window, decide at every snapshot whether the tenant's running jobs
//! keep eligible work out of the scheduler's backfill window, then fold
//! those verdicts into report statistics.

pub mod aggregate;
pub mod analysis;
pub mod claim;
pub mod classify;
pub mod report;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::AggregateError;
pub use analysis::{AnalysisParams, ClassifiedSnapshot, ClassifiedWindow, classify_window};
pub use claim::TenantClaim;
pub use classify::{BlockKind, Classifier, Verdict};
pub use report::{AnalysisError, Metric, Report, ReportKind, Series, build_report};
