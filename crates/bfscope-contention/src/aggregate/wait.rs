//! Queue waits of other projects' jobs with and without the tenant present.

use crate::analysis::ClassifiedSnapshot;
use crate::stats::{Summary, WelchTest, welch_t_test};
use bfscope_core::{CompletedJob, JobSizeBin, TenantMatcher};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitComparison {
    /// Waits (seconds) of jobs that started while the tenant held capacity
    pub inside: Vec<f64>,
    /// Waits of jobs that started while it held none
    pub outside: Vec<f64>,
    pub inside_summary: Option<Summary>,
    pub outside_summary: Option<Summary>,
    pub welch: Option<WelchTest>,
    /// Jobs starting before the first snapshot, so their side is unknown
    pub unplaced: usize,
}

/// Compare `start - submission` of non-tenant completed jobs.
///
/// A job counts as inside when the latest snapshot at or before its start
/// had the tenant holding processors. Jobs with a start before submission
/// are ignored.
pub fn wait_time_comparison(
    completed: &[CompletedJob],
    snapshots: &[ClassifiedSnapshot],
    tenant: &TenantMatcher,
    size_bin: Option<JobSizeBin>,
) -> WaitComparison {
    let presence: Vec<(i64, bool)> = snapshots
        .iter()
        .map(|s| (s.snapshot.time, s.claim.is_present()))
        .collect();

    let mut inside = Vec::new();
    let mut outside = Vec::new();
    let mut unplaced = 0;

    for done in completed {
        let job = &done.job;
        if tenant.matches_job(job) {
            continue;
        }
        if size_bin.is_some_and(|bin| JobSizeBin::of(job.nodes()) != bin) {
            continue;
        }
        let Some(wait) = job.wait_time() else {
            continue;
        };
        let idx = presence.partition_point(|&(t, _)| t <= job.start_time);
        if idx == 0 {
            unplaced += 1;
            continue;
        }
        if presence[idx - 1].1 {
            inside.push(wait as f64);
        } else {
            outside.push(wait as f64);
        }
    }

    WaitComparison {
        inside_summary: Summary::of(&inside),
        outside_summary: Summary::of(&outside),
        welch: welch_t_test(&inside, &outside),
        inside,
        outside,
        unplaced,
    }
}
