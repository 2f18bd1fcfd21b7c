//! Folding classified snapshots into report statistics.

pub mod blocking;
pub mod sizes;
pub mod usage;
pub mod wait;

pub use blocking::{
    BlockingProbability, FirstBlock, MonthlyBlocking, blocking_probability, blocking_tenant_jobs,
    completion_codes, monthly_breakdown, time_to_first_block,
};
pub use sizes::{Histogram, TenantJobSizes, tenant_job_sizes};
pub use usage::{Reclaimed, TenantUsage, reclaimed_node_hours, tenant_usage};
pub use wait::{WaitComparison, wait_time_comparison};

use thiserror::Error;

/// A statistic that has no value for the requested window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("{metric} is undefined: no {denominator} in the requested window")]
    EmptyWindow {
        metric: &'static str,
        denominator: &'static str,
    },
    #[error("{metric} is undefined: needs at least {needed} values per group")]
    TooFewValues { metric: &'static str, needed: usize },
}
