//! In-memory snapshot source for tests.

use bfscope_core::{
    ActiveJob, BackfillWindow, CompletedBatch, CompletedJob, EligibleJob, LoadedSnapshot,
    SampleId, Snapshot, SnapshotSource, TimeWindow,
};
use thiserror::Error;

pub const TENANT_ACCOUNT: &str = "CSC108";
pub const TENANT_USER: &str = "doleynik";

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Snapshot {0} not found")]
    Missing(SampleId),
}

#[derive(Debug, Default)]
pub struct MemorySource {
    snapshots: Vec<LoadedSnapshot>,
    completed: Vec<CompletedJob>,
}

impl MemorySource {
    pub fn new(mut snapshots: Vec<LoadedSnapshot>) -> Self {
        for (seq, snap) in snapshots.iter_mut().enumerate() {
            snap.snapshot.seq = seq as i64 + 1;
        }
        Self {
            snapshots,
            completed: Vec::new(),
        }
    }

    pub fn with_completed(mut self, completed: Vec<CompletedJob>) -> Self {
        self.completed = completed;
        self
    }
}

impl SnapshotSource for MemorySource {
    type Error = MemoryError;

    fn snapshots_in(&self, window: &TimeWindow) -> Result<Vec<Snapshot>, MemoryError> {
        let mut out: Vec<_> = self
            .snapshots
            .iter()
            .filter(|s| window.contains(s.snapshot.time))
            .map(|s| s.snapshot.clone())
            .collect();
        out.sort_by_key(|s| (s.time, s.seq));
        Ok(out)
    }

    fn load_snapshot(&self, id: &SampleId) -> Result<LoadedSnapshot, MemoryError> {
        self.snapshots
            .iter()
            .find(|s| &s.snapshot.id == id)
            .cloned()
            .ok_or_else(|| MemoryError::Missing(id.clone()))
    }

    fn completed_in(&self, window: &TimeWindow) -> Result<CompletedBatch, MemoryError> {
        let mut jobs: Vec<_> = self
            .completed
            .iter()
            .filter(|j| window.contains(j.job.start_time))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.job.start_time);
        Ok(CompletedBatch {
            jobs,
            warnings: Vec::new(),
        })
    }
}

pub fn active_job(job_id: &str, account: &str, procs: i64, start: i64, walltime: i64) -> ActiveJob {
    let user = if account == TENANT_ACCOUNT {
        TENANT_USER
    } else {
        "alice"
    };
    ActiveJob {
        job_id: job_id.to_string(),
        account: account.to_string(),
        user: user.to_string(),
        class: "batch".to_string(),
        job_name: format!("SAGA-Python-PBSJobScript.{job_id}"),
        requested_processors: procs,
        requested_nodes: None,
        start_time: start,
        requested_walltime: walltime,
        submission_time: start,
    }
}

pub fn completed_job(
    job_id: &str,
    account: &str,
    procs: i64,
    submitted: i64,
    start: i64,
    code: Option<i64>,
) -> CompletedJob {
    let mut job = active_job(job_id, account, procs, start, 3600);
    job.submission_time = submitted;
    CompletedJob {
        job,
        completion_time: start + 1800,
        completion_code: code,
    }
}

pub struct SnapshotBuilder {
    snapshot: LoadedSnapshot,
}

impl SnapshotBuilder {
    pub fn new(id: &str, time: i64) -> Self {
        Self {
            snapshot: LoadedSnapshot {
                snapshot: Snapshot {
                    seq: 0,
                    id: SampleId::new(id),
                    time,
                },
                active: Vec::new(),
                eligible: Vec::new(),
                backfill: Vec::new(),
                warnings: Vec::new(),
            },
        }
    }

    /// A window open at the sample time.
    pub fn backfill(self, procs: i64, duration: i64) -> Self {
        let start = self.snapshot.snapshot.time;
        self.backfill_at(procs, duration, start)
    }

    pub fn backfill_at(mut self, procs: i64, duration: i64, start: i64) -> Self {
        self.snapshot.backfill.push(BackfillWindow {
            partition: "titan".to_string(),
            available_processors: procs,
            available_nodes: Some(procs / 16),
            available_duration: duration,
            window_start_time: start,
        });
        self
    }

    pub fn tenant_job(self, job_id: &str, procs: i64, start: i64, walltime: i64) -> Self {
        self.active(active_job(job_id, TENANT_ACCOUNT, procs, start, walltime))
    }

    pub fn active(mut self, job: ActiveJob) -> Self {
        self.snapshot.active.push(job);
        self
    }

    /// A waited batch job from another project.
    pub fn eligible(self, job_id: &str, procs: i64, walltime: i64) -> Self {
        self.eligible_job(EligibleJob {
            job_id: job_id.to_string(),
            account: "BIP123".to_string(),
            user: "alice".to_string(),
            class: "batch".to_string(),
            job_name: "run".to_string(),
            requested_processors: procs,
            requested_nodes: None,
            requested_walltime: Some(walltime),
            submission_time: Some(0),
            eligible_elapsed: Some(60),
        })
    }

    pub fn eligible_job(mut self, job: EligibleJob) -> Self {
        self.snapshot.eligible.push(job);
        self
    }

    pub fn build(self) -> LoadedSnapshot {
        self.snapshot
    }
}
