//! Walks a time window snapshot by snapshot and classifies every eligible job.

use crate::claim::TenantClaim;
use crate::classify::{Classifier, Verdict};
use bfscope_core::{
    BackfillWindow, JobSizeBin, RecordTable, RecordWarning, Snapshot, SnapshotSource,
    TenantMatcher, TimeWindow, WarningSummary,
};
use tracing::{debug, warn};

/// Everything an analysis run is parameterized by.
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    pub tenant: TenantMatcher,
    pub window: TimeWindow,

    /// Queue class the blocking predicates are scoped to
    pub batch_class: String,

    pub histogram_bins: usize,

    /// Restrict the wait-time comparison to one job-size bin
    pub size_bin: Option<JobSizeBin>,
}

impl AnalysisParams {
    pub fn new(tenant: TenantMatcher, window: TimeWindow) -> Self {
        Self {
            tenant,
            window,
            batch_class: "batch".to_string(),
            histogram_bins: 50,
            size_bin: None,
        }
    }
}

/// Classifier output for one snapshot.
#[derive(Debug, Clone)]
pub struct ClassifiedSnapshot {
    pub snapshot: Snapshot,
    pub claim: TenantClaim,

    /// Backfill windows open at the sample time
    pub backfill: Vec<BackfillWindow>,

    pub verdicts: Vec<Verdict>,
}

impl ClassifiedSnapshot {
    /// At least one batch job that has actually waited.
    pub fn has_in_scope_job(&self) -> bool {
        self.verdicts.iter().any(|v| v.in_scope)
    }

    /// At least one job the tenant is blocking under the headline test.
    pub fn tenant_blocked(&self) -> bool {
        self.verdicts
            .iter()
            .any(|v| v.combined && v.tenant_is_necessary_cause)
    }

    pub fn in_scope(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| v.in_scope)
    }
}

/// All classified snapshots of a window, in time order, with the warnings
/// raised while loading and classifying them.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedWindow {
    pub snapshots: Vec<ClassifiedSnapshot>,
    pub warnings: WarningSummary,
}

/// Load and classify every consistent snapshot in `params.window`.
pub fn classify_window<S: SnapshotSource>(
    source: &S,
    params: &AnalysisParams,
) -> Result<ClassifiedWindow, S::Error> {
    let mut out = ClassifiedWindow::default();

    for snapshot in source.snapshots_in(&params.window)? {
        let loaded = source.load_snapshot(&snapshot.id)?;
        let consistent = loaded.is_consistent();
        out.warnings.extend(loaded.warnings.iter().cloned());
        if !consistent {
            warn!(sample_id = %snapshot.id, "Skipping inconsistent sample");
            continue;
        }

        let time = loaded.snapshot.time;
        let claim = TenantClaim::compute(&params.tenant, &loaded.active, time);
        let backfill: Vec<BackfillWindow> = loaded.current_backfill().cloned().collect();
        let classifier = Classifier::new(&params.batch_class, &backfill, &claim);

        let mut verdicts = Vec::with_capacity(loaded.eligible.len());
        for job in &loaded.eligible {
            match classifier.classify(job) {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => out.warnings.push(RecordWarning::malformed(
                    Some(&snapshot.id),
                    RecordTable::Eligible,
                    Some(&job.job_id),
                    &e,
                )),
            }
        }

        debug!(
            sample_id = %snapshot.id,
            claimed = claim.claimed_processors,
            eligible = verdicts.len(),
            "Classified snapshot"
        );
        out.snapshots.push(ClassifiedSnapshot {
            snapshot: loaded.snapshot,
            claim,
            backfill,
            verdicts,
        });
    }

    Ok(out)
}
