//! Per-job blocking classification.
//!
//! For each eligible job at a snapshot, decide whether the tenant's claim is
//! what keeps it out of the current backfill window. All comparisons are
//! strict and ties count as not blocked: a job asking for exactly the
//! window's processors does not fit it, yet is not spatially blocked either.

use crate::claim::TenantClaim;
use bfscope_core::{BackfillWindow, EligibleJob, NormalizeError};
use serde::{Deserialize, Serialize};

/// How an eligible job is blocked by the tenant's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    NotBlocked,
    /// Too wide for backfill alone, but narrow enough with the claim released
    SpatiallyBlocked,
    /// Too long for backfill, but shorter than the tenant's longest remaining job
    TemporallyBlocked,
    BothBlocked,
}

impl BlockKind {
    fn from_flags(spatial: bool, temporal: bool) -> Self {
        match (spatial, temporal) {
            (false, false) => Self::NotBlocked,
            (true, false) => Self::SpatiallyBlocked,
            (false, true) => Self::TemporallyBlocked,
            (true, true) => Self::BothBlocked,
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, Self::SpatiallyBlocked | Self::BothBlocked)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::TemporallyBlocked | Self::BothBlocked)
    }

    pub fn is_blocked(&self) -> bool {
        *self != Self::NotBlocked
    }
}

/// Classification of one eligible job at one snapshot.
///
/// Each flag holds when the test passes against at least one backfill
/// window open at the sample time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub job_id: String,
    pub requested_processors: i64,
    pub requested_nodes: i64,
    pub requested_walltime: i64,

    /// Batch-class job that has actually waited in the eligible queue
    pub in_scope: bool,

    /// Always `NotBlocked` for jobs out of scope
    pub kind: BlockKind,

    /// The headline test: an in-scope job that would fit in a backfill
    /// window plus the tenant's processors, within that window's duration
    pub combined: bool,

    /// Fits no open window (`procs >= avail || walltime >= duration` for
    /// each); false when no window is open
    pub exceeds_backfill: bool,

    /// Fits some open window outright; false when no window is open
    pub fits_backfill: bool,

    /// The tenant holds capacity and the in-scope job is blocked against it
    pub tenant_is_necessary_cause: bool,
}

/// Evaluates eligible jobs against one snapshot's open windows and tenant claim.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    pub batch_class: &'a str,

    /// Windows open at the sample time
    pub windows: &'a [BackfillWindow],

    pub claim: &'a TenantClaim,
}

impl<'a> Classifier<'a> {
    pub fn new(
        batch_class: &'a str,
        windows: &'a [BackfillWindow],
        claim: &'a TenantClaim,
    ) -> Self {
        Self {
            batch_class,
            windows,
            claim,
        }
    }

    fn any_window(&self, test: impl Fn(&BackfillWindow) -> bool) -> bool {
        self.windows.iter().any(test)
    }

    /// Classify one job.
    ///
    /// Fails only when the job cannot be sized in time (missing or negative
    /// walltime); callers skip it and record a warning.
    pub fn classify(&self, job: &EligibleJob) -> Result<Verdict, NormalizeError> {
        let walltime = job
            .requested_walltime
            .ok_or(NormalizeError::MissingField("ReqAWDuration"))?;
        if walltime < 0 {
            return Err(NormalizeError::Invalid {
                field: "ReqAWDuration",
                value: walltime,
            });
        }
        let procs = job.requested_processors;
        let in_scope = job.class == self.batch_class && job.has_waited();

        let mut verdict = Verdict {
            job_id: job.job_id.clone(),
            requested_processors: procs,
            requested_nodes: job.nodes(),
            requested_walltime: walltime,
            in_scope,
            kind: BlockKind::NotBlocked,
            combined: false,
            exceeds_backfill: false,
            fits_backfill: false,
            tenant_is_necessary_cause: false,
        };

        if self.windows.is_empty() {
            return Ok(verdict);
        }
        verdict.fits_backfill = self
            .any_window(|w| procs < w.available_processors && walltime < w.available_duration);
        verdict.exceeds_backfill = !verdict.fits_backfill;

        let claimed = self.claim.claimed_processors;
        if claimed <= 0 || !in_scope {
            return Ok(verdict);
        }

        let max_remaining = self.claim.max_remaining_walltime;
        let spatial = self.any_window(|w| {
            procs > w.available_processors && procs < w.available_processors + claimed
        });
        let temporal =
            self.any_window(|w| walltime > w.available_duration && walltime < max_remaining);
        verdict.kind = BlockKind::from_flags(spatial, temporal);
        verdict.combined = self.any_window(|w| {
            walltime < w.available_duration && procs < w.available_processors + claimed
        });
        verdict.tenant_is_necessary_cause = verdict.kind.is_blocked() || verdict.combined;

        Ok(verdict)
    }
}
