//! How much of the machine the tenant occupies, and for how long.

use super::AggregateError;
use crate::analysis::ClassifiedSnapshot;
use bfscope_core::CompletedJob;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUsage {
    pub samples: u64,
    /// Snapshots at which the tenant holds any processors
    pub present_samples: u64,
    pub presence_fraction: f64,
    pub peak_nodes: i64,
    pub mean_claimed_nodes: f64,
    /// Longest interval between consecutive tenant-present snapshots
    pub longest_gap_seconds: Option<i64>,
}

/// Snapshots must be time-ordered.
pub fn tenant_usage(snapshots: &[ClassifiedSnapshot]) -> Result<TenantUsage, AggregateError> {
    if snapshots.is_empty() {
        return Err(AggregateError::EmptyWindow {
            metric: "tenant usage",
            denominator: "snapshots",
        });
    }

    let present: Vec<i64> = snapshots
        .iter()
        .filter(|s| s.claim.is_present())
        .map(|s| s.snapshot.time)
        .collect();
    let samples = snapshots.len() as u64;
    let total_nodes: i64 = snapshots.iter().map(|s| s.claim.claimed_nodes).sum();

    Ok(TenantUsage {
        samples,
        present_samples: present.len() as u64,
        presence_fraction: present.len() as f64 / samples as f64,
        peak_nodes: snapshots
            .iter()
            .map(|s| s.claim.claimed_nodes)
            .max()
            .unwrap_or(0),
        mean_claimed_nodes: total_nodes as f64 / samples as f64,
        longest_gap_seconds: present.windows(2).map(|w| w[1] - w[0]).max(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reclaimed {
    /// Tenant jobs followed by a later non-tenant start
    pub jobs: usize,
    pub node_hours: f64,
    pub per_job: f64,
}

/// Node-hours the tenant's jobs occupied before the machine next started
/// someone else's job.
///
/// For each tenant job: nodes x hours from its start to the first non-tenant
/// start at or after it. Tenant jobs with no later non-tenant start are left
/// out.
///
/// Precondition: `tenant_jobs` is sorted by start time and `other_starts` is
/// sorted ascending.
pub fn reclaimed_node_hours(
    tenant_jobs: &[CompletedJob],
    other_starts: &[i64],
) -> Result<Reclaimed, AggregateError> {
    debug_assert!(tenant_jobs.is_sorted_by_key(|j| j.job.start_time));
    debug_assert!(other_starts.is_sorted());

    let mut next = 0;
    let mut jobs = 0;
    let mut node_hours = 0.0;
    for job in tenant_jobs {
        let start = job.job.start_time;
        while next < other_starts.len() && other_starts[next] < start {
            next += 1;
        }
        let Some(&other) = other_starts.get(next) else {
            break;
        };
        jobs += 1;
        node_hours += job.job.nodes() as f64 * (other - start) as f64 / 3600.0;
    }

    if jobs == 0 {
        return Err(AggregateError::EmptyWindow {
            metric: "reclaimed node-hours",
            denominator: "tenant jobs followed by another project's job",
        });
    }
    Ok(Reclaimed {
        jobs,
        node_hours,
        per_job: node_hours / jobs as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisParams, classify_window};
    use crate::testing::{MemorySource, SnapshotBuilder, TENANT_ACCOUNT, completed_job};
    use bfscope_core::{TenantSelector, TimeWindow};

    #[test]
    fn test_tenant_usage() {
        let source = MemorySource::new(vec![
            SnapshotBuilder::new("s1", 1000).tenant_job("t1", 160, 0, 3600).build(),
            SnapshotBuilder::new("s2", 2000).build(),
            SnapshotBuilder::new("s3", 4000)
                .tenant_job("t1", 160, 0, 9000)
                .tenant_job("t2", 320, 3000, 3600)
                .build(),
            SnapshotBuilder::new("s4", 4500).tenant_job("t2", 320, 3000, 3600).build(),
        ]);
        let params = AnalysisParams::new(
            TenantSelector::new("CSC108", "doleynik").compile().unwrap(),
            TimeWindow::new(0, 10_000).unwrap(),
        );
        let classified = classify_window(&source, &params).unwrap();
        let usage = tenant_usage(&classified.snapshots).unwrap();
        assert_eq!(usage.samples, 4);
        assert_eq!(usage.present_samples, 3);
        assert_eq!(usage.presence_fraction, 0.75);
        assert_eq!(usage.peak_nodes, 30);
        assert_eq!(usage.mean_claimed_nodes, (10.0 + 30.0 + 20.0) / 4.0);
        assert_eq!(usage.longest_gap_seconds, Some(3000));
    }

    #[test]
    fn test_tenant_usage_empty() {
        assert!(tenant_usage(&[]).is_err());
    }

    #[test]
    fn test_reclaimed_node_hours() {
        let tenant = vec![
            completed_job("t1", TENANT_ACCOUNT, 160, 0, 0, Some(0)),
            completed_job("t2", TENANT_ACCOUNT, 32, 0, 3600, Some(0)),
            completed_job("t3", TENANT_ACCOUNT, 16, 0, 20_000, Some(0)),
        ];
        // t1 waits 1h for the next start, t2 starts alongside one
        let others = vec![3600, 3600, 7200];
        let reclaimed = reclaimed_node_hours(&tenant, &others).unwrap();
        assert_eq!(reclaimed.jobs, 2);
        assert_eq!(reclaimed.node_hours, 10.0);
        assert_eq!(reclaimed.per_job, 5.0);
    }

    #[test]
    fn test_reclaimed_without_followers() {
        let tenant = vec![completed_job("t1", TENANT_ACCOUNT, 160, 0, 500, Some(0))];
        assert!(matches!(
            reclaimed_node_hours(&tenant, &[100]),
            Err(AggregateError::EmptyWindow { .. })
        ));
    }
}
