//! Report assembly.
//!
//! A [`Report`] is a flat map of named scalar metrics plus plain numeric
//! series for an external renderer. Statistics that have no value for the
//! window (an empty denominator, too few samples) appear as
//! [`Metric::Undefined`] rather than failing the report; failures reading
//! the store abort it with an [`AnalysisError`].

use crate::aggregate::{self, AggregateError, Histogram};
use crate::analysis::{AnalysisParams, ClassifiedWindow, classify_window};
use crate::stats::Summary;
use bfscope_core::{CompletedBatch, SnapshotSource, TenantSelector, TimeWindow, WarningSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to compute {metric} for tenant {tenant} over {window}: {source}")]
    Metric {
        metric: String,
        tenant: String,
        window: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Which statistics a report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Blocking,
    Monthly,
    FirstBlock,
    Sizes,
    WaitTimes,
    Usage,
    CompletionCodes,
    All,
}

impl ReportKind {
    const SECTIONS: [ReportKind; 7] = [
        ReportKind::Blocking,
        ReportKind::Monthly,
        ReportKind::FirstBlock,
        ReportKind::Sizes,
        ReportKind::WaitTimes,
        ReportKind::Usage,
        ReportKind::CompletionCodes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Blocking => "blocking",
            ReportKind::Monthly => "monthly",
            ReportKind::FirstBlock => "first-block",
            ReportKind::Sizes => "sizes",
            ReportKind::WaitTimes => "wait-times",
            ReportKind::Usage => "usage",
            ReportKind::CompletionCodes => "completion-codes",
            ReportKind::All => "all",
        }
    }

    fn sections(self) -> Vec<ReportKind> {
        match self {
            ReportKind::All => Self::SECTIONS.to_vec(),
            kind => vec![kind],
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Count(u64),
    Number(f64),
    Undefined { reason: String },
    Record(serde_json::Value),
}

impl Metric {
    fn undefined(err: &AggregateError) -> Self {
        Metric::Undefined {
            reason: err.to_string(),
        }
    }

    fn record<T: Serialize>(value: &T) -> Self {
        serde_json::to_value(value)
            .map(Metric::Record)
            .unwrap_or_else(|e| Metric::Undefined {
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Count(n) => write!(f, "{n}"),
            Metric::Number(x) => write!(f, "{x:.6}"),
            Metric::Undefined { reason } => write!(f, "undefined ({reason})"),
            Metric::Record(value) => write!(f, "{value}"),
        }
    }
}

/// Parallel x/y data, optionally labelled per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn xy(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            x,
            y,
        }
    }

    /// One point per label, x being the label's position.
    pub fn categorical(name: impl Into<String>, labels: Vec<String>, y: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            x: (0..labels.len()).map(|i| i as f64).collect(),
            labels,
            y,
        }
    }

    fn histogram(name: impl Into<String>, hist: &Histogram) -> Self {
        Self {
            name: name.into(),
            labels: hist.labels(),
            x: hist.edges[..hist.counts.len()].to_vec(),
            y: hist.counts.iter().map(|&c| c as f64).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub kind: ReportKind,
    pub tenant: TenantSelector,
    pub window: TimeWindow,
    pub metrics: BTreeMap<String, Metric>,
    pub series: Vec<Series>,
    pub warnings: WarningSummary,
}

impl Report {
    fn metric(&mut self, name: &str, value: Metric) {
        self.metrics.insert(name.to_string(), value);
    }
}

/// Classify `params.window` once and compute the statistics `kind` asks for.
pub fn build_report<S: SnapshotSource>(
    source: &S,
    params: &AnalysisParams,
    kind: ReportKind,
) -> Result<Report, AnalysisError> {
    let fail = |metric: &str| {
        let tenant = params.tenant.selector().to_string();
        let window = params.window.to_string();
        let metric = metric.to_string();
        move |e: S::Error| AnalysisError::Metric {
            metric,
            tenant,
            window,
            source: Box::new(e),
        }
    };

    info!(
        tenant = %params.tenant.selector(),
        window = %params.window,
        kind = %kind,
        "Building report"
    );
    let classified = classify_window(source, params).map_err(fail("snapshot classification"))?;
    debug!(snapshots = classified.snapshots.len(), "Window classified");

    let mut report = Report {
        kind,
        tenant: params.tenant.selector().clone(),
        window: params.window,
        metrics: BTreeMap::new(),
        series: Vec::new(),
        warnings: classified.warnings.clone(),
    };

    let mut window_completed: Option<CompletedBatch> = None;
    for section in kind.sections() {
        match section {
            ReportKind::Blocking => add_blocking(&mut report, &classified),
            ReportKind::Monthly => add_monthly(&mut report, &classified),
            ReportKind::FirstBlock => add_first_block(&mut report, &classified),
            ReportKind::Sizes => add_sizes(&mut report, &classified, params.histogram_bins),
            ReportKind::WaitTimes => {
                let completed = completed_for_window(
                    source,
                    params,
                    &mut window_completed,
                    &mut report.warnings,
                )
                .map_err(fail("wait times"))?;
                add_wait_times(&mut report, &classified, completed, params);
            }
            ReportKind::Usage => {
                let completed = completed_for_window(
                    source,
                    params,
                    &mut window_completed,
                    &mut report.warnings,
                )
                .map_err(fail("tenant usage"))?;
                add_usage(&mut report, &classified, completed, params);
            }
            ReportKind::CompletionCodes => {
                let jobs = aggregate::blocking_tenant_jobs(&classified.snapshots);
                let starts = jobs.values().copied();
                let completed = match (starts.clone().min(), starts.max()) {
                    (Some(first), Some(last)) => {
                        let span = TimeWindow {
                            start: first,
                            end: last + 1,
                        };
                        let batch = source.completed_in(&span).map_err(fail("completion codes"))?;
                        report.warnings.extend(batch.warnings);
                        batch.jobs
                    }
                    _ => Vec::new(),
                };
                let codes = aggregate::completion_codes(&jobs, &completed);
                report.metric("blocking_tenant_jobs", Metric::Count(jobs.len() as u64));
                report.metric("completion_codes", Metric::record(&codes));
                let (labels, counts): (Vec<_>, Vec<_>) =
                    codes.into_iter().map(|(code, n)| (code, n as f64)).unzip();
                report
                    .series
                    .push(Series::categorical("completion_codes", labels, counts));
            }
            ReportKind::All => {}
        }
    }

    Ok(report)
}

/// Fetch completed jobs for the analysis window once per report.
fn completed_for_window<'a, S: SnapshotSource>(
    source: &S,
    params: &AnalysisParams,
    cache: &'a mut Option<CompletedBatch>,
    warnings: &mut WarningSummary,
) -> Result<&'a CompletedBatch, S::Error> {
    if cache.is_none() {
        let batch = source.completed_in(&params.window)?;
        warnings.extend(batch.warnings.iter().cloned());
        *cache = Some(batch);
    }
    Ok(cache.get_or_insert_with(CompletedBatch::default))
}

fn add_blocking(report: &mut Report, classified: &ClassifiedWindow) {
    match aggregate::blocking_probability(&classified.snapshots) {
        Ok(p) => {
            report.metric("blocking_probability", Metric::Number(p.probability));
            report.metric("blocked_samples", Metric::Count(p.blocked_samples));
            report.metric("eligible_samples", Metric::Count(p.eligible_samples));
        }
        Err(e) => report.metric("blocking_probability", Metric::undefined(&e)),
    }
}

fn add_monthly(report: &mut Report, classified: &ClassifiedWindow) {
    let months = aggregate::monthly_breakdown(&classified.snapshots);
    report.metric("months", Metric::Count(months.len() as u64));
    if months.is_empty() {
        return;
    }

    let labels: Vec<String> = months.iter().map(|m| m.month.clone()).collect();
    let category = |name: &str, pick: fn(&aggregate::MonthlyBlocking) -> u64| {
        Series::categorical(
            name,
            labels.clone(),
            months.iter().map(|m| m.percent(pick(m))).collect(),
        )
    };
    report.series.push(category("monthly_spatial_pct", |m| m.spatial));
    report.series.push(category("monthly_temporal_pct", |m| m.temporal));
    report.series.push(category("monthly_combined_pct", |m| m.combined));
    report.series.push(category("monthly_unexplained_pct", |m| m.unexplained));
    report.series.push(Series::categorical(
        "monthly_samples",
        labels,
        months.iter().map(|m| m.samples as f64).collect(),
    ));
    report.metric("monthly", Metric::record(&months));
}

fn add_first_block(report: &mut Report, classified: &ClassifiedWindow) {
    let first = aggregate::time_to_first_block(&classified.snapshots);
    let seconds: Vec<f64> = first.iter().map(|f| f.seconds as f64).collect();

    report.metric("first_block_jobs", Metric::Count(first.len() as u64));
    match Summary::of(&seconds) {
        Some(summary) => {
            report.metric("first_block_mean_seconds", Metric::Number(summary.mean));
            report.metric("first_block_median_seconds", Metric::Number(summary.median));
        }
        None => report.metric(
            "first_block_median_seconds",
            Metric::undefined(&AggregateError::EmptyWindow {
                metric: "time to first block",
                denominator: "tenant-caused blocks",
            }),
        ),
    }
    report.series.push(Series::categorical(
        "time_to_first_block",
        first.into_iter().map(|f| f.job_id).collect(),
        seconds,
    ));
}

fn add_sizes(report: &mut Report, classified: &ClassifiedWindow, bins: usize) {
    let sizes = aggregate::tenant_job_sizes(&classified.snapshots, bins);
    report.metric("tenant_jobs", Metric::Count(sizes.jobs as u64));
    for (name, hist) in [
        ("nodes_log10_histogram", &sizes.nodes),
        ("processors_log10_histogram", &sizes.processors),
        ("walltime_seconds_histogram", &sizes.walltime_seconds),
    ] {
        if let Some(hist) = hist {
            report.series.push(Series::histogram(name, hist));
        }
    }
}

fn add_wait_times(
    report: &mut Report,
    classified: &ClassifiedWindow,
    completed: &CompletedBatch,
    params: &AnalysisParams,
) {
    let cmp = aggregate::wait_time_comparison(
        &completed.jobs,
        &classified.snapshots,
        &params.tenant,
        params.size_bin,
    );

    let no_jobs = |side: &'static str| {
        Metric::undefined(&AggregateError::EmptyWindow {
            metric: side,
            denominator: "completed jobs",
        })
    };
    report.metric(
        "wait_inside",
        cmp.inside_summary
            .as_ref()
            .map_or_else(|| no_jobs("wait time with tenant present"), Metric::record),
    );
    report.metric(
        "wait_outside",
        cmp.outside_summary
            .as_ref()
            .map_or_else(|| no_jobs("wait time with tenant absent"), Metric::record),
    );
    report.metric("wait_unplaced", Metric::Count(cmp.unplaced as u64));

    match &cmp.welch {
        Some(test) => {
            report.metric("welch_t", Metric::Number(test.t));
            report.metric("welch_df", Metric::Number(test.df));
            report.metric("welch_p", Metric::Number(test.p_value));
        }
        None => report.metric(
            "welch_p",
            Metric::undefined(&AggregateError::TooFewValues {
                metric: "Welch's t-test",
                needed: 2,
            }),
        ),
    }

    let index = |v: &[f64]| -> Vec<f64> { (0..v.len()).map(|i| i as f64).collect() };
    report
        .series
        .push(Series::xy("wait_seconds_inside", index(&cmp.inside), cmp.inside.clone()));
    report
        .series
        .push(Series::xy("wait_seconds_outside", index(&cmp.outside), cmp.outside));
}

fn add_usage(
    report: &mut Report,
    classified: &ClassifiedWindow,
    completed: &CompletedBatch,
    params: &AnalysisParams,
) {
    match aggregate::tenant_usage(&classified.snapshots) {
        Ok(usage) => {
            report.metric("samples", Metric::Count(usage.samples));
            report.metric("present_samples", Metric::Count(usage.present_samples));
            report.metric("presence_fraction", Metric::Number(usage.presence_fraction));
            report.metric("peak_nodes", Metric::Count(usage.peak_nodes.max(0) as u64));
            report.metric("mean_claimed_nodes", Metric::Number(usage.mean_claimed_nodes));
            report.metric(
                "longest_gap_seconds",
                usage.longest_gap_seconds.map_or_else(
                    || {
                        Metric::undefined(&AggregateError::TooFewValues {
                            metric: "longest gap",
                            needed: 2,
                        })
                    },
                    |gap| Metric::Count(gap.max(0) as u64),
                ),
            );
        }
        Err(e) => report.metric("presence_fraction", Metric::undefined(&e)),
    }

    let times: Vec<f64> = classified
        .snapshots
        .iter()
        .map(|s| s.snapshot.time as f64)
        .collect();
    report.series.push(Series::xy(
        "claimed_nodes",
        times.clone(),
        classified
            .snapshots
            .iter()
            .map(|s| s.claim.claimed_nodes as f64)
            .collect(),
    ));
    report.series.push(Series::xy(
        "remaining_node_hours",
        times,
        classified
            .snapshots
            .iter()
            .map(|s| s.claim.remaining_node_hours)
            .collect(),
    ));

    let (mut tenant_jobs, others): (Vec<_>, Vec<_>) = completed
        .jobs
        .iter()
        .cloned()
        .partition(|j| params.tenant.matches_job(&j.job));
    let mut other_starts: Vec<i64> = others.iter().map(|j| j.job.start_time).collect();
    other_starts.sort_unstable();
    tenant_jobs.sort_by_key(|j| j.job.start_time);

    match aggregate::reclaimed_node_hours(&tenant_jobs, &other_starts) {
        Ok(r) => {
            report.metric("reclaimed_jobs", Metric::Count(r.jobs as u64));
            report.metric("reclaimed_node_hours", Metric::Number(r.node_hours));
            report.metric("reclaimed_node_hours_per_job", Metric::Number(r.per_job));
        }
        Err(e) => report.metric("reclaimed_node_hours", Metric::undefined(&e)),
    }
}
