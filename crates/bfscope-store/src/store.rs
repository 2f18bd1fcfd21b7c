use crate::schema::{self, CaptureKind};
use bfscope_core::{BackfillRecord, JobRecord, SampleId};
use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, Transaction, params};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Snapshot {sample_id} not found in store")]
    MissingSnapshot { sample_id: SampleId },
    #[error("Store schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: i64, supported: i64 },
}

/// One showq poll: the active, eligible and completed queues at a sample time.
#[derive(Debug, Clone)]
pub struct QueueSample {
    pub sample_id: SampleId,
    pub sample_time: i64,
    pub active: Vec<JobRecord>,
    pub eligible: Vec<JobRecord>,
    pub completed: Vec<JobRecord>,
}

/// One showbf poll: backfill windows reported at a sample time.
#[derive(Debug, Clone)]
pub struct BackfillSample {
    pub sample_id: SampleId,
    pub sample_time: i64,
    pub windows: Vec<BackfillRecord>,
}

/// Rows actually written by an insert; already-present rows are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub new_sample: bool,
    pub active: usize,
    pub eligible: usize,
    pub completed: usize,
    pub backfill: usize,
    /// Job records dropped for lacking a JobID
    pub unkeyed: usize,
}

/// SQLite-backed storage for scheduler snapshots.
pub struct SnapshotStore {
    pub(crate) conn: Connection,
    path: Option<Utf8PathBuf>,
}

impl SnapshotStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        debug!(%path, "Opened snapshot store");
        Ok(Self {
            conn,
            path: Some(path.to_owned()),
        })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Path of the database file, None for in-memory stores.
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Number of distinct samples stored.
    pub fn sample_count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM samples", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Insert a showq poll. Re-inserting the same sample changes nothing.
    pub fn insert_queue_sample(&mut self, sample: &QueueSample) -> Result<InsertSummary, StoreError> {
        let tx = self.conn.transaction()?;
        let mut summary = InsertSummary {
            new_sample: insert_sample_row(&tx, &sample.sample_id, sample.sample_time)?,
            ..InsertSummary::default()
        };

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO active (
                    SampleID, SampleTime, JobID, Account, User, Class, JobName,
                    ReqProcs, ReqNodes, ReqAWDuration, StartTime, SubmissionTime
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for job in &sample.active {
                let Some(job_id) = job.job_id.as_deref() else {
                    summary.unkeyed += 1;
                    continue;
                };
                summary.active += stmt.execute(params![
                    sample.sample_id.as_str(),
                    sample.sample_time,
                    job_id,
                    job.account,
                    job.user,
                    job.class,
                    job.job_name,
                    job.req_procs,
                    job.req_nodes,
                    job.req_walltime,
                    job.start_time,
                    job.submission_time,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO eligible (
                    SampleID, SampleTime, JobID, Account, User, Class, JobName,
                    ReqProcs, ReqNodes, ReqAWDuration, SubmissionTime, EEDuration
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for job in &sample.eligible {
                let Some(job_id) = job.job_id.as_deref() else {
                    summary.unkeyed += 1;
                    continue;
                };
                summary.eligible += stmt.execute(params![
                    sample.sample_id.as_str(),
                    sample.sample_time,
                    job_id,
                    job.account,
                    job.user,
                    job.class,
                    job.job_name,
                    job.req_procs,
                    job.req_nodes,
                    job.req_walltime,
                    job.submission_time,
                    job.eligible_elapsed,
                ])?;
            }
        }

        let (completed, unkeyed) = insert_completed_rows(&tx, &sample.completed)?;
        summary.completed = completed;
        summary.unkeyed += unkeyed;

        tx.commit()?;
        debug!(
            sample_id = %sample.sample_id,
            active = summary.active,
            eligible = summary.eligible,
            completed = summary.completed,
            "Inserted queue sample"
        );
        Ok(summary)
    }

    /// Insert a showbf poll. Re-inserting the same sample changes nothing.
    pub fn insert_backfill_sample(
        &mut self,
        sample: &BackfillSample,
    ) -> Result<InsertSummary, StoreError> {
        let tx = self.conn.transaction()?;
        let mut summary = InsertSummary {
            new_sample: insert_sample_row(&tx, &sample.sample_id, sample.sample_time)?,
            ..InsertSummary::default()
        };

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO backfill (
                    SampleID, SampleTime, Partition, idx,
                    proccount, nodecount, duration, starttime
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for window in &sample.windows {
                summary.backfill += stmt.execute(params![
                    sample.sample_id.as_str(),
                    sample.sample_time,
                    window.partition,
                    window.index,
                    window.proccount,
                    window.nodecount,
                    window.duration,
                    window.starttime,
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            sample_id = %sample.sample_id,
            windows = summary.backfill,
            "Inserted backfill sample"
        );
        Ok(summary)
    }

    /// Insert completed jobs; a JobID already present is left untouched.
    pub fn insert_completed(&mut self, jobs: &[JobRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let (inserted, _) = insert_completed_rows(&tx, jobs)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Remember that a capture file has been handled.
    pub fn record_capture_file(
        &self,
        kind: CaptureKind,
        outfilename: &str,
        errfilecontents: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO capture_files (kind, outfilename, errfilecontents)
                VALUES (?1, ?2, ?3)",
            params![kind.as_str(), outfilename, errfilecontents],
        )?;
        Ok(())
    }

    /// Names of capture files of `kind` already handled.
    pub fn imported_capture_files(&self, kind: CaptureKind) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT outfilename FROM capture_files WHERE kind = ?1")?;
        let names = stmt
            .query_map(params![kind.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }
}

/// Returns true when the sample row is new.
fn insert_sample_row(
    tx: &Transaction<'_>,
    sample_id: &SampleId,
    sample_time: i64,
) -> Result<bool, StoreError> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO samples (SampleID, SampleTime) VALUES (?1, ?2)",
        params![sample_id.as_str(), sample_time],
    )?;
    Ok(inserted > 0)
}

fn insert_completed_rows(
    tx: &Transaction<'_>,
    jobs: &[JobRecord],
) -> Result<(usize, usize), StoreError> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO completed (
            JobID, Account, User, Class, JobName, ReqProcs, ReqNodes,
            ReqAWDuration, StartTime, SubmissionTime, CompletionTime, CompletionCode
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    let mut inserted = 0;
    let mut unkeyed = 0;
    for job in jobs {
        let Some(job_id) = job.job_id.as_deref() else {
            unkeyed += 1;
            continue;
        };
        inserted += stmt.execute(params![
            job_id,
            job.account,
            job.user,
            job.class,
            job.job_name,
            job.req_procs,
            job.req_nodes,
            job.req_walltime,
            job.start_time,
            job.submission_time,
            job.completion_time,
            job.completion_code,
        ])?;
    }
    Ok((inserted, unkeyed))
}
