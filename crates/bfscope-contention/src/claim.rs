//! The tenant's hold on cluster capacity at one snapshot.

use bfscope_core::{ActiveJob, TenantMatcher};
use serde::{Deserialize, Serialize};

/// What the tenant's running jobs occupy at a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantClaim {
    /// Sum of requested processors over the tenant's active jobs
    pub claimed_processors: i64,

    /// Sum of requested nodes over the tenant's active jobs
    pub claimed_nodes: i64,

    /// Longest walltime any tenant job still has left; 0 with no jobs
    pub max_remaining_walltime: i64,

    /// Node-hours left if every tenant job runs to its limit
    pub remaining_node_hours: f64,

    /// The tenant's active jobs at this snapshot
    pub jobs: Vec<ActiveJob>,
}

impl TenantClaim {
    pub fn compute(tenant: &TenantMatcher, active: &[ActiveJob], sample_time: i64) -> Self {
        let mut claim = TenantClaim::default();
        for job in active.iter().filter(|j| tenant.matches_job(j)) {
            let remaining = job.remaining_walltime(sample_time);
            claim.claimed_processors += job.requested_processors;
            claim.claimed_nodes += job.nodes();
            claim.max_remaining_walltime = claim.max_remaining_walltime.max(remaining);
            claim.remaining_node_hours += job.nodes() as f64 * remaining.max(0) as f64 / 3600.0;
            claim.jobs.push(job.clone());
        }
        claim
    }

    /// Whether the tenant holds any capacity at all.
    pub fn is_present(&self) -> bool {
        self.claimed_processors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfscope_core::TenantSelector;

    fn job(account: &str, procs: i64, start: i64, walltime: i64) -> ActiveJob {
        ActiveJob {
            job_id: format!("{account}-{procs}-{start}"),
            account: account.to_string(),
            user: "doleynik".to_string(),
            class: "batch".to_string(),
            job_name: "SAGA-Python-PBSJobScript.1".to_string(),
            requested_processors: procs,
            requested_nodes: None,
            start_time: start,
            requested_walltime: walltime,
            submission_time: 0,
        }
    }

    #[test]
    fn test_claim_sums_tenant_jobs_only() {
        let tenant = TenantSelector::new("CSC108", "doleynik").compile().unwrap();
        let active = vec![
            job("CSC108", 160, 0, 3600),
            job("CSC108", 32, 500, 1800),
            job("BIP123", 9600, 0, 86400),
        ];
        let claim = TenantClaim::compute(&tenant, &active, 1000);
        assert_eq!(claim.claimed_processors, 192);
        assert_eq!(claim.claimed_nodes, 12);
        assert_eq!(claim.max_remaining_walltime, 2600);
        assert_eq!(claim.jobs.len(), 2);
        assert!(claim.is_present());
        // 10 nodes * 2600s + 2 nodes * 1300s
        assert!((claim.remaining_node_hours - (26000.0 + 2600.0) / 3600.0).abs() < 1e-9);
    }

    #[test]
    fn test_claim_empty_without_tenant_jobs() {
        let tenant = TenantSelector::new("CSC108", "doleynik").compile().unwrap();
        let claim = TenantClaim::compute(&tenant, &[job("BIP123", 16, 0, 60)], 10);
        assert_eq!(claim, TenantClaim::default());
        assert!(!claim.is_present());
    }

    #[test]
    fn test_claim_respects_job_name_pattern() {
        let tenant = TenantSelector::new("CSC108", "doleynik")
            .with_job_name_pattern("SAGA-*")
            .compile()
            .unwrap();
        let mut other = job("CSC108", 64, 0, 60);
        other.job_name = "interactive".to_string();
        let claim = TenantClaim::compute(&tenant, &[job("CSC108", 16, 0, 60), other], 10);
        assert_eq!(claim.claimed_processors, 16);
    }
}
