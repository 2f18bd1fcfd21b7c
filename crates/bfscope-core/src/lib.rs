//! Scheduler snapshot data model for bfscope.
//!
//! Typed views of MOAB job-queue samples, the raw records they are
//! normalized from, tenant/time-window selection, and the
//! [`SnapshotSource`] seam the analysis engine reads through.

pub mod records;
pub mod source;
pub mod tenant;
pub mod types;

pub use records::{
    BackfillRecord, JobRecord, NormalizeError, RecordTable, RecordWarning, WarningSummary,
};
pub use source::{CompletedBatch, LoadedSnapshot, SnapshotSource};
pub use tenant::{ConfigError, TenantMatcher, TenantSelector, TimeWindow};
pub use types::{
    ActiveJob, BackfillWindow, CompletedJob, EligibleJob, JobSizeBin, PROCS_PER_NODE, SampleId,
    Snapshot,
};
