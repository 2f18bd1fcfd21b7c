//! The read seam between snapshot storage and analysis.

use crate::records::RecordWarning;
use crate::tenant::TimeWindow;
use crate::types::{ActiveJob, BackfillWindow, CompletedJob, EligibleJob, SampleId, Snapshot};
use serde::{Deserialize, Serialize};

/// One snapshot's records, normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub active: Vec<ActiveJob>,
    pub eligible: Vec<EligibleJob>,
    pub backfill: Vec<BackfillWindow>,

    /// Records dropped during normalization, plus any join inconsistency
    pub warnings: Vec<RecordWarning>,
}

impl LoadedSnapshot {
    /// False when the sample's sub-tables disagree on SampleTime.
    pub fn is_consistent(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, RecordWarning::InconsistentJoin { .. }))
    }

    /// Backfill windows open at the sample time.
    ///
    /// showbf also lists windows opening later; those are skipped. Several
    /// windows may open at once (a wide short one next to a narrow long one),
    /// and all of them are returned.
    pub fn current_backfill(&self) -> impl Iterator<Item = &BackfillWindow> {
        let time = self.snapshot.time;
        self.backfill.iter().filter(move |w| w.is_current(time))
    }
}

/// Completed jobs for a window, with the rows that failed normalization.
#[derive(Debug, Clone, Default)]
pub struct CompletedBatch {
    pub jobs: Vec<CompletedJob>,
    pub warnings: Vec<RecordWarning>,
}

/// Read access to stored snapshots.
pub trait SnapshotSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Snapshots whose time lies in `window`, ordered by time then sequence.
    fn snapshots_in(&self, window: &TimeWindow) -> Result<Vec<Snapshot>, Self::Error>;

    /// Load and normalize every record of one snapshot.
    fn load_snapshot(&self, id: &SampleId) -> Result<LoadedSnapshot, Self::Error>;

    /// Completed jobs whose start time lies in `window`.
    fn completed_in(&self, window: &TimeWindow) -> Result<CompletedBatch, Self::Error>;
}
