//! Raw capture records and their normalization into typed entities.
//!
//! Rows come out of the store exactly as they were captured: any numeric
//! column may be NULL. Normalization enforces the required fields per entity
//! and reports anything it had to drop as a [`RecordWarning`].

use crate::types::{ActiveJob, BackfillWindow, CompletedJob, EligibleJob, SampleId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("field {field} has invalid value {value}")]
    Invalid { field: &'static str, value: i64 },
}

/// Which snapshot table a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTable {
    Active,
    Eligible,
    Backfill,
    Completed,
}

impl fmt::Display for RecordTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Eligible => "eligible",
            Self::Backfill => "backfill",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Raw job attributes from a showq `<job>` element or a store row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Option<String>,
    pub account: Option<String>,
    pub user: Option<String>,
    pub class: Option<String>,
    pub job_name: Option<String>,
    pub req_procs: Option<i64>,
    pub req_nodes: Option<i64>,
    pub req_walltime: Option<i64>,
    pub start_time: Option<i64>,
    pub submission_time: Option<i64>,
    pub eligible_elapsed: Option<i64>,
    pub completion_time: Option<i64>,
    pub completion_code: Option<i64>,
}

/// Raw backfill window from a showbf `<range>` element or a store row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillRecord {
    pub partition: String,
    pub index: i64,
    pub proccount: Option<i64>,
    pub nodecount: Option<i64>,
    pub duration: Option<i64>,
    pub starttime: Option<i64>,
}

fn required<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T, NormalizeError> {
    value.clone().ok_or(NormalizeError::MissingField(field))
}

fn non_negative(value: i64, field: &'static str) -> Result<i64, NormalizeError> {
    if value < 0 {
        Err(NormalizeError::Invalid { field, value })
    } else {
        Ok(value)
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl JobRecord {
    /// Normalize into an [`ActiveJob`]; every timing field is required.
    pub fn to_active(&self) -> Result<ActiveJob, NormalizeError> {
        Ok(ActiveJob {
            job_id: required(&self.job_id, "JobID")?,
            account: required(&self.account, "Account")?,
            user: required(&self.user, "User")?,
            class: text(&self.class),
            job_name: text(&self.job_name),
            requested_processors: non_negative(required(&self.req_procs, "ReqProcs")?, "ReqProcs")?,
            requested_nodes: self.req_nodes,
            start_time: required(&self.start_time, "StartTime")?,
            requested_walltime: non_negative(
                required(&self.req_walltime, "ReqAWDuration")?,
                "ReqAWDuration",
            )?,
            submission_time: required(&self.submission_time, "SubmissionTime")?,
        })
    }

    /// Normalize into an [`EligibleJob`].
    ///
    /// Walltime stays optional here; the classifier decides what to do with
    /// a job it cannot size in time.
    pub fn to_eligible(&self) -> Result<EligibleJob, NormalizeError> {
        Ok(EligibleJob {
            job_id: required(&self.job_id, "JobID")?,
            account: text(&self.account),
            user: text(&self.user),
            class: text(&self.class),
            job_name: text(&self.job_name),
            requested_processors: non_negative(required(&self.req_procs, "ReqProcs")?, "ReqProcs")?,
            requested_nodes: self.req_nodes,
            requested_walltime: self.req_walltime,
            submission_time: self.submission_time,
            eligible_elapsed: self.eligible_elapsed,
        })
    }

    /// Normalize into a [`CompletedJob`].
    pub fn to_completed(&self) -> Result<CompletedJob, NormalizeError> {
        Ok(CompletedJob {
            job: self.to_active()?,
            completion_time: required(&self.completion_time, "CompletionTime")?,
            completion_code: self.completion_code,
        })
    }
}

impl BackfillRecord {
    pub fn to_window(&self) -> Result<BackfillWindow, NormalizeError> {
        Ok(BackfillWindow {
            partition: self.partition.clone(),
            available_processors: non_negative(required(&self.proccount, "proccount")?, "proccount")?,
            available_nodes: self.nodecount,
            available_duration: non_negative(required(&self.duration, "duration")?, "duration")?,
            window_start_time: required(&self.starttime, "starttime")?,
        })
    }
}

/// Non-fatal problems found while loading or classifying records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordWarning {
    /// A record failed a required-field or type check and was skipped.
    MalformedRecord {
        sample_id: Option<SampleId>,
        table: RecordTable,
        job_id: Option<String>,
        reason: String,
    },
    /// A sample's sub-tables disagree on SampleTime; the sample is excluded.
    InconsistentJoin {
        sample_id: SampleId,
        sample_times: Vec<i64>,
    },
}

impl RecordWarning {
    pub fn malformed(
        sample_id: Option<&SampleId>,
        table: RecordTable,
        job_id: Option<&str>,
        err: &NormalizeError,
    ) -> Self {
        Self::MalformedRecord {
            sample_id: sample_id.cloned(),
            table,
            job_id: job_id.map(str::to_string),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRecord {
                sample_id,
                table,
                job_id,
                reason,
            } => write!(
                f,
                "skipped {} record (sample {}, job {}): {}",
                table,
                sample_id.as_ref().map(SampleId::as_str).unwrap_or("-"),
                job_id.as_deref().unwrap_or("-"),
                reason
            ),
            Self::InconsistentJoin {
                sample_id,
                sample_times,
            } => write!(
                f,
                "sample {} excluded: sub-tables disagree on SampleTime {:?}",
                sample_id, sample_times
            ),
        }
    }
}

/// Warnings gathered over a whole analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningSummary {
    /// Records skipped for failing a field check
    pub malformed_records: usize,

    /// Samples excluded for inconsistent SampleTime values
    pub inconsistent_samples: usize,

    pub details: Vec<RecordWarning>,
}

impl WarningSummary {
    pub fn push(&mut self, warning: RecordWarning) {
        match warning {
            RecordWarning::MalformedRecord { .. } => self.malformed_records += 1,
            RecordWarning::InconsistentJoin { .. } => self.inconsistent_samples += 1,
        }
        self.details.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = RecordWarning>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}
