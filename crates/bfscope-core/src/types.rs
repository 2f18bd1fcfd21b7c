//! Typed snapshot entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Processors per compute node in this cluster's accounting convention.
pub const PROCS_PER_NODE: i64 = 16;

/// Resolve a node count: an explicit `ReqNodes` wins, otherwise processors / 16.
fn resolve_nodes(requested_processors: i64, requested_nodes: Option<i64>) -> i64 {
    requested_nodes.unwrap_or(requested_processors / PROCS_PER_NODE)
}

/// Opaque identifier of one scheduler poll.
///
/// For captured data this is the hex token shared by the poll's showq and
/// showbf output files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(String);

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One scheduler poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Store-assigned insertion sequence, monotonic in import order.
    pub seq: i64,

    /// Poll identifier
    pub id: SampleId,

    /// Poll time (Unix seconds)
    pub time: i64,
}

/// A job running at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: String,
    pub account: String,
    pub user: String,

    /// Queue class (e.g. "batch")
    pub class: String,
    pub job_name: String,

    /// Requested processors
    pub requested_processors: i64,

    /// Explicit requested node count, when the scheduler reported one
    pub requested_nodes: Option<i64>,

    /// Start time (Unix seconds)
    pub start_time: i64,

    /// Requested walltime in seconds
    pub requested_walltime: i64,

    /// Submission time (Unix seconds)
    pub submission_time: i64,
}

impl ActiveJob {
    /// Requested nodes, preferring the explicit count over the 16:1 ratio.
    pub fn nodes(&self) -> i64 {
        resolve_nodes(self.requested_processors, self.requested_nodes)
    }

    /// Walltime left at `sample_time` if the job runs to its limit.
    pub fn remaining_walltime(&self, sample_time: i64) -> i64 {
        self.start_time + self.requested_walltime - sample_time
    }

    /// Queue wait, or None when the record has start before submission.
    pub fn wait_time(&self) -> Option<i64> {
        (self.submission_time <= self.start_time).then(|| self.start_time - self.submission_time)
    }
}

/// A job waiting in the eligible queue at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleJob {
    pub job_id: String,
    pub account: String,
    pub user: String,
    pub class: String,
    pub job_name: String,
    pub requested_processors: i64,
    pub requested_nodes: Option<i64>,

    /// Requested walltime in seconds; None when the capture omitted it
    pub requested_walltime: Option<i64>,

    pub submission_time: Option<i64>,

    /// Seconds the job has already spent eligible
    pub eligible_elapsed: Option<i64>,
}

impl EligibleJob {
    pub fn nodes(&self) -> i64 {
        resolve_nodes(self.requested_processors, self.requested_nodes)
    }

    /// Whether the job has actually been eligible for a while, rather than
    /// being picked up in the same poll it was submitted.
    pub fn has_waited(&self) -> bool {
        self.eligible_elapsed.is_some_and(|e| e > 0)
    }
}

/// The scheduler's estimate of backfill capacity at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillWindow {
    /// Partition the window was reported for
    pub partition: String,
    pub available_processors: i64,
    pub available_nodes: Option<i64>,

    /// Seconds the capacity stays available
    pub available_duration: i64,

    /// When the window opens (Unix seconds)
    pub window_start_time: i64,
}

impl BackfillWindow {
    /// Whether the window is open right now rather than a future reservation gap.
    pub fn is_current(&self, sample_time: i64) -> bool {
        self.window_start_time == sample_time
    }
}

/// Terminal record for a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedJob {
    #[serde(flatten)]
    pub job: ActiveJob,

    /// Completion time (Unix seconds)
    pub completion_time: i64,

    /// Scheduler completion code, if reported
    pub completion_code: Option<i64>,
}

/// OLCF scheduling bins by requested node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSizeBin {
    /// 11250+ nodes
    Bin1,
    /// 3750 - 11249 nodes
    Bin2,
    /// 313 - 3749 nodes
    Bin3,
    /// 126 - 312 nodes
    Bin4,
    /// 125 nodes or fewer
    Bin5,
}

impl JobSizeBin {
    pub fn of(nodes: i64) -> Self {
        match nodes {
            n if n >= 11250 => Self::Bin1,
            n if n >= 3750 => Self::Bin2,
            n if n >= 313 => Self::Bin3,
            n if n >= 126 => Self::Bin4,
            _ => Self::Bin5,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Bin1),
            2 => Some(Self::Bin2),
            3 => Some(Self::Bin3),
            4 => Some(Self::Bin4),
            5 => Some(Self::Bin5),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::Bin1 => 1,
            Self::Bin2 => 2,
            Self::Bin3 => 3,
            Self::Bin4 => 4,
            Self::Bin5 => 5,
        }
    }
}
