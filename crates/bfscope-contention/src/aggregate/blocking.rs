//! Blocking counts over a window.

use super::AggregateError;
use crate::analysis::ClassifiedSnapshot;
use crate::classify::Verdict;
use bfscope_core::CompletedJob;
use bfscope_parsers::month_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockingProbability {
    /// Snapshots where the tenant blocks at least one job
    pub blocked_samples: u64,
    /// Snapshots with at least one batch job that has waited
    pub eligible_samples: u64,
    pub probability: f64,
}

/// Fraction of snapshots with waiting batch work at which the tenant blocks
/// at least one job.
pub fn blocking_probability(
    snapshots: &[ClassifiedSnapshot],
) -> Result<BlockingProbability, AggregateError> {
    let eligible_samples = snapshots.iter().filter(|s| s.has_in_scope_job()).count() as u64;
    let blocked_samples = snapshots.iter().filter(|s| s.tenant_blocked()).count() as u64;
    if eligible_samples == 0 {
        return Err(AggregateError::EmptyWindow {
            metric: "blocking probability",
            denominator: "snapshots with waiting batch jobs",
        });
    }
    Ok(BlockingProbability {
        blocked_samples,
        eligible_samples,
        probability: blocked_samples as f64 / eligible_samples as f64,
    })
}

/// Per-month sample counts by blocking cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBlocking {
    /// "MM-YYYY"
    pub month: String,
    /// Snapshots with at least one batch job that has waited
    pub samples: u64,
    pub spatial: u64,
    pub temporal: u64,
    pub combined: u64,
    /// The tenant holds capacity, but some waiting job already fits backfill
    pub unexplained: u64,
}

impl MonthlyBlocking {
    /// `count` as a percentage of this month's samples.
    pub fn percent(&self, count: u64) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.samples as f64
        }
    }
}

/// Monthly breakdown, in chronological order. Snapshots must be time-ordered.
pub fn monthly_breakdown(snapshots: &[ClassifiedSnapshot]) -> Vec<MonthlyBlocking> {
    let mut months: Vec<MonthlyBlocking> = Vec::new();

    for snap in snapshots.iter().filter(|s| s.has_in_scope_job()) {
        let key = month_key(snap.snapshot.time);
        if months.last().is_none_or(|m| m.month != key) {
            months.push(MonthlyBlocking {
                month: key,
                ..MonthlyBlocking::default()
            });
        }
        let Some(month) = months.last_mut() else {
            continue;
        };

        month.samples += 1;
        let attributed = |test: fn(&Verdict) -> bool| {
            snap.in_scope()
                .any(|v| v.tenant_is_necessary_cause && test(v))
        };
        if attributed(|v| v.kind.is_spatial()) {
            month.spatial += 1;
        }
        if attributed(|v| v.kind.is_temporal()) {
            month.temporal += 1;
        }
        if snap.tenant_blocked() {
            month.combined += 1;
        }
        if snap.claim.is_present() && snap.in_scope().any(|v| v.fits_backfill) {
            month.unexplained += 1;
        }
    }

    months
}

/// How long a tenant job ran before it first blocked someone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstBlock {
    pub job_id: String,
    pub start_time: i64,
    pub sample_time: i64,
    pub seconds: i64,
}

/// Time to first block for every tenant job active at a blocking snapshot,
/// ordered by job id.
pub fn time_to_first_block(snapshots: &[ClassifiedSnapshot]) -> Vec<FirstBlock> {
    let mut first: BTreeMap<String, FirstBlock> = BTreeMap::new();
    for snap in snapshots.iter().filter(|s| s.tenant_blocked()) {
        let t = snap.snapshot.time;
        for job in &snap.claim.jobs {
            let seconds = t - job.start_time;
            first
                .entry(job.job_id.clone())
                .and_modify(|fb| {
                    if seconds < fb.seconds {
                        fb.sample_time = t;
                        fb.seconds = seconds;
                    }
                })
                .or_insert_with(|| FirstBlock {
                    job_id: job.job_id.clone(),
                    start_time: job.start_time,
                    sample_time: t,
                    seconds,
                });
        }
    }
    first.into_values().collect()
}

/// Tenant jobs active at any blocking snapshot, with their start times.
pub fn blocking_tenant_jobs(snapshots: &[ClassifiedSnapshot]) -> BTreeMap<String, i64> {
    snapshots
        .iter()
        .filter(|s| s.tenant_blocked())
        .flat_map(|s| s.claim.jobs.iter())
        .map(|j| (j.job_id.clone(), j.start_time))
        .collect()
}

/// Count completion codes of the given jobs; a missing code counts as "unknown".
pub fn completion_codes(
    job_ids: &BTreeMap<String, i64>,
    completed: &[CompletedJob],
) -> BTreeMap<String, u64> {
    let mut codes = BTreeMap::new();
    for done in completed
        .iter()
        .filter(|c| job_ids.contains_key(&c.job.job_id))
    {
        let code = done
            .completion_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        *codes.entry(code).or_insert(0) += 1;
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisParams, classify_window};
    use crate::testing::{MemorySource, SnapshotBuilder, TENANT_ACCOUNT, completed_job};
    use bfscope_core::{TenantSelector, TimeWindow};

    fn classify(source: &MemorySource) -> Vec<ClassifiedSnapshot> {
        let params = AnalysisParams::new(
            TenantSelector::new("CSC108", "doleynik").compile().unwrap(),
            TimeWindow::new(0, 100_000_000).unwrap(),
        );
        classify_window(source, &params).unwrap().snapshots
    }

    #[test]
    fn test_blocking_probability_half() {
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("s1", 1000)
                .backfill(50, 2000)
                .tenant_job("t1", 100, 0, 7200)
                .eligible("e1", 120, 1000)
                .build(),
            SnapshotBuilder::new("s2", 2000)
                .backfill(50, 2000)
                .eligible("e1", 120, 1000)
                .build(),
        ]);
        let result = blocking_probability(&classify(&source)).unwrap();
        assert_eq!(result.blocked_samples, 1);
        assert_eq!(result.eligible_samples, 2);
        assert_eq!(result.probability, 0.5);
    }

    #[test]
    fn test_blocking_probability_uses_every_open_window() {
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("s1", 1000)
                .backfill(1600, 5400)
                .backfill(640, 86_400)
                .backfill_at(6400, 90_000, 4000)
                .tenant_job("t1", 160, 0, 90_000)
                .eligible("e1", 700, 10_000)
                .build(),
        ]);
        let classified = classify(&source);
        assert_eq!(classified[0].backfill.len(), 2);
        let result = blocking_probability(&classified).unwrap();
        assert_eq!(result.blocked_samples, 1);
        assert_eq!(result.probability, 1.0);
    }

    #[test]
    fn test_blocking_probability_empty_window() {
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("s1", 1000)
                .backfill(50, 2000)
                .tenant_job("t1", 100, 0, 7200)
                .build(),
        ]);
        assert!(matches!(
            blocking_probability(&classify(&source)),
            Err(AggregateError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn test_time_to_first_block() {
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("s0", 100)
                .backfill(500, 2000)
                .tenant_job("t1", 100, 0, 7200)
                .build(),
            SnapshotBuilder::new("s1", 300)
                .backfill(50, 2000)
                .tenant_job("t1", 100, 0, 7200)
                .eligible("e1", 120, 1000)
                .build(),
            SnapshotBuilder::new("s2", 600)
                .backfill(50, 2000)
                .tenant_job("t1", 100, 0, 7200)
                .eligible("e1", 120, 1000)
                .build(),
        ]);
        let first = time_to_first_block(&classify(&source));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].job_id, "t1");
        assert_eq!(first[0].seconds, 300);
        assert_eq!(first[0].sample_time, 300);
    }

    #[test]
    fn test_monthly_breakdown() {
        // 2018-06-15 and 2018-07-15 UTC
        let june = 1_529_020_800;
        let july = 1_531_612_800;
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("j1", june)
                .backfill(50, 2000)
                .tenant_job("t1", 100, june - 10, 7200)
                .eligible("e1", 120, 1000)
                .build(),
            SnapshotBuilder::new("j2", june + 600)
                .backfill(500, 2000)
                .tenant_job("t1", 100, june - 10, 7200)
                .eligible("e2", 16, 100)
                .build(),
            SnapshotBuilder::new("k1", july)
                .backfill(50, 600)
                .tenant_job("t2", 32, july - 10, 7200)
                .eligible("e3", 16, 3600)
                .build(),
        ]);
        let months = monthly_breakdown(&classify(&source));
        assert_eq!(months.len(), 2);

        assert_eq!(months[0].month, "06-2018");
        assert_eq!(months[0].samples, 2);
        assert_eq!(months[0].spatial, 1);
        assert_eq!(months[0].temporal, 0);
        // e2 fits the raw window but still counts under the headline test
        assert_eq!(months[0].combined, 2);
        assert_eq!(months[0].unexplained, 1);
        assert_eq!(months[0].percent(months[0].spatial), 50.0);

        assert_eq!(months[1].month, "07-2018");
        assert_eq!(months[1].temporal, 1);
        assert_eq!(months[1].combined, 0);
    }

    #[test]
    fn test_completion_codes_of_blocking_jobs() {
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("s1", 1000)
                .backfill(50, 2000)
                .tenant_job("t1", 100, 0, 7200)
                .tenant_job("t2", 16, 10, 7200)
                .eligible("e1", 120, 1000)
                .build(),
            SnapshotBuilder::new("s2", 2000)
                .backfill(5000, 2000)
                .tenant_job("t3", 16, 1500, 7200)
                .build(),
        ]);
        let jobs = blocking_tenant_jobs(&classify(&source));
        assert_eq!(jobs.keys().cloned().collect::<Vec<_>>(), vec!["t1", "t2"]);

        let completed = vec![
            completed_job("t1", TENANT_ACCOUNT, 100, 0, 0, Some(0)),
            completed_job("t2", TENANT_ACCOUNT, 16, 0, 10, None),
            completed_job("t3", TENANT_ACCOUNT, 16, 0, 1500, Some(271)),
        ];
        let codes = completion_codes(&jobs, &completed);
        assert_eq!(codes.get("0"), Some(&1));
        assert_eq!(codes.get("unknown"), Some(&1));
        assert_eq!(codes.get("271"), None);
    }
}
