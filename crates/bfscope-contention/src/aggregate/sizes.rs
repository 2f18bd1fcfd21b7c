//! Size histograms of the tenant's jobs.

use crate::analysis::ClassifiedSnapshot;
use bfscope_core::ActiveJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Equal-width histogram. For a log histogram the edges are log10 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub log10: bool,
    /// `counts.len() + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    /// Values left out because a log scale cannot place them
    pub skipped: u64,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their range.
    ///
    /// The last bin is closed on the right. If every value is equal the
    /// single-value range is widened to one unit around it.
    pub fn linear(values: &[f64], bins: usize) -> Option<Self> {
        let bins = bins.max(1);
        let (mut lo, mut hi) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        if values.is_empty() {
            return None;
        }
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let mut counts = vec![0u64; bins];
        for &v in values {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();

        Some(Self {
            log10: false,
            edges,
            counts,
            skipped: 0,
        })
    }

    /// Bin `log10(value)`; values at or below zero are skipped.
    pub fn log10(values: &[f64], bins: usize) -> Option<Self> {
        let logs: Vec<f64> = values.iter().filter(|&&v| v > 0.0).map(|v| v.log10()).collect();
        let mut hist = Self::linear(&logs, bins)?;
        hist.log10 = true;
        hist.skipped = (values.len() - logs.len()) as u64;
        Some(hist)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// "[lo, hi)" label per bin, in linear units.
    pub fn labels(&self) -> Vec<String> {
        let unscale = |e: f64| if self.log10 { 10f64.powf(e) } else { e };
        self.edges
            .windows(2)
            .map(|w| format!("[{:.1}, {:.1})", unscale(w[0]), unscale(w[1])))
            .collect()
    }
}

/// Histograms over the distinct tenant jobs seen in a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantJobSizes {
    pub jobs: usize,
    pub nodes: Option<Histogram>,
    pub processors: Option<Histogram>,
    pub walltime_seconds: Option<Histogram>,
}

pub fn tenant_job_sizes(snapshots: &[ClassifiedSnapshot], bins: usize) -> TenantJobSizes {
    let jobs: BTreeMap<&str, &ActiveJob> = snapshots
        .iter()
        .flat_map(|s| s.claim.jobs.iter())
        .map(|j| (j.job_id.as_str(), j))
        .collect();

    let nodes: Vec<f64> = jobs.values().map(|j| j.nodes() as f64).collect();
    let procs: Vec<f64> = jobs.values().map(|j| j.requested_processors as f64).collect();
    let walltimes: Vec<f64> = jobs.values().map(|j| j.requested_walltime as f64).collect();

    TenantJobSizes {
        jobs: jobs.len(),
        nodes: Histogram::log10(&nodes, bins),
        processors: Histogram::log10(&procs, bins),
        walltime_seconds: Histogram::linear(&walltimes, bins),
    }
}
