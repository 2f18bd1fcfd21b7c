//! Reading snapshots back out of the store.
//!
//! Captures are stored verbatim, so columns are read loosely: an integer
//! column holding text such as `"3600.0"` is parsed rather than rejected.
//! Normalization into typed entities happens here and anything dropped is
//! reported as a [`RecordWarning`] on the loaded snapshot.

use crate::store::{SnapshotStore, StoreError};
use bfscope_core::{
    BackfillRecord, CompletedBatch, JobRecord, LoadedSnapshot, RecordTable, RecordWarning,
    SampleId, Snapshot, SnapshotSource, TimeWindow,
};
use bfscope_parsers::parse_int;
use rusqlite::types::ValueRef;
use rusqlite::{OptionalExtension, Row, params};
use std::collections::BTreeSet;
use tracing::{debug, warn};

fn int_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(v) => Some(v),
        ValueRef::Real(v) if v.is_finite() => Some(v.trunc() as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(parse_int),
        _ => None,
    })
}

fn text_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(v) => Some(v.to_string()),
        _ => None,
    })
}

/// Columns shared by every job table, starting at `base`:
/// JobID, Account, User, Class, JobName, ReqProcs, ReqNodes, ReqAWDuration.
fn job_prefix(row: &Row<'_>, base: usize) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        job_id: text_col(row, base)?,
        account: text_col(row, base + 1)?,
        user: text_col(row, base + 2)?,
        class: text_col(row, base + 3)?,
        job_name: text_col(row, base + 4)?,
        req_procs: int_col(row, base + 5)?,
        req_nodes: int_col(row, base + 6)?,
        req_walltime: int_col(row, base + 7)?,
        ..JobRecord::default()
    })
}

impl SnapshotStore {
    /// Snapshots with SampleTime in `window`, ordered by time then insertion.
    pub fn snapshots_in(&self, window: &TimeWindow) -> Result<Vec<Snapshot>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, SampleID, SampleTime FROM samples
                WHERE SampleTime >= ?1 AND SampleTime < ?2
                ORDER BY SampleTime, seq",
        )?;
        let snapshots = stmt
            .query_map(params![window.start, window.end], |row| {
                Ok(Snapshot {
                    seq: row.get(0)?,
                    id: SampleId::new(row.get::<_, String>(1)?),
                    time: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(%window, count = snapshots.len(), "Listed snapshots");
        Ok(snapshots)
    }

    /// Load one snapshot and normalize its records.
    ///
    /// If the sample's sub-tables disagree on SampleTime the result carries
    /// an `InconsistentJoin` warning and callers should skip it.
    pub fn load_snapshot(&self, id: &SampleId) -> Result<LoadedSnapshot, StoreError> {
        let snapshot = self
            .conn
            .query_row(
                "SELECT seq, SampleTime FROM samples WHERE SampleID = ?1",
                params![id.as_str()],
                |row| {
                    Ok(Snapshot {
                        seq: row.get(0)?,
                        id: id.clone(),
                        time: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::MissingSnapshot {
                sample_id: id.clone(),
            })?;

        let mut sample_times = BTreeSet::from([snapshot.time]);
        let mut warnings = Vec::new();

        let mut stmt = self.conn.prepare(
            "SELECT SampleTime, JobID, Account, User, Class, JobName,
                    ReqProcs, ReqNodes, ReqAWDuration, StartTime, SubmissionTime
                FROM active WHERE SampleID = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                let mut record = job_prefix(row, 1)?;
                record.start_time = int_col(row, 9)?;
                record.submission_time = int_col(row, 10)?;
                Ok((row.get::<_, i64>(0)?, record))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut active = Vec::with_capacity(rows.len());
        for (time, record) in rows {
            sample_times.insert(time);
            match record.to_active() {
                Ok(job) => active.push(job),
                Err(e) => warnings.push(RecordWarning::malformed(
                    Some(id),
                    RecordTable::Active,
                    record.job_id.as_deref(),
                    &e,
                )),
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT SampleTime, JobID, Account, User, Class, JobName,
                    ReqProcs, ReqNodes, ReqAWDuration, SubmissionTime, EEDuration
                FROM eligible WHERE SampleID = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                let mut record = job_prefix(row, 1)?;
                record.submission_time = int_col(row, 9)?;
                record.eligible_elapsed = int_col(row, 10)?;
                Ok((row.get::<_, i64>(0)?, record))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut eligible = Vec::with_capacity(rows.len());
        for (time, record) in rows {
            sample_times.insert(time);
            match record.to_eligible() {
                Ok(job) => eligible.push(job),
                Err(e) => warnings.push(RecordWarning::malformed(
                    Some(id),
                    RecordTable::Eligible,
                    record.job_id.as_deref(),
                    &e,
                )),
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT SampleTime, Partition, idx, proccount, nodecount, duration, starttime
                FROM backfill WHERE SampleID = ?1 ORDER BY Partition, idx",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                let record = BackfillRecord {
                    partition: row.get(1)?,
                    index: row.get(2)?,
                    proccount: int_col(row, 3)?,
                    nodecount: int_col(row, 4)?,
                    duration: int_col(row, 5)?,
                    starttime: int_col(row, 6)?,
                };
                Ok((row.get::<_, i64>(0)?, record))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut backfill = Vec::with_capacity(rows.len());
        for (time, record) in rows {
            sample_times.insert(time);
            match record.to_window() {
                Ok(window) => backfill.push(window),
                Err(e) => warnings.push(RecordWarning::malformed(
                    Some(id),
                    RecordTable::Backfill,
                    None,
                    &e,
                )),
            }
        }

        if sample_times.len() > 1 {
            warn!(sample_id = %id, times = ?sample_times, "Sample sub-tables disagree on SampleTime");
            warnings.push(RecordWarning::InconsistentJoin {
                sample_id: id.clone(),
                sample_times: sample_times.into_iter().collect(),
            });
        }

        Ok(LoadedSnapshot {
            snapshot,
            active,
            eligible,
            backfill,
            warnings,
        })
    }

    /// Completed jobs whose StartTime lies in `window`, ordered by start.
    pub fn completed_in(&self, window: &TimeWindow) -> Result<CompletedBatch, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT JobID, Account, User, Class, JobName, ReqProcs, ReqNodes, ReqAWDuration,
                    StartTime, SubmissionTime, CompletionTime, CompletionCode
                FROM completed
                WHERE StartTime >= ?1 AND StartTime < ?2
                ORDER BY StartTime, JobID",
        )?;
        let rows = stmt
            .query_map(params![window.start, window.end], |row| {
                let mut record = job_prefix(row, 0)?;
                record.start_time = int_col(row, 8)?;
                record.submission_time = int_col(row, 9)?;
                record.completion_time = int_col(row, 10)?;
                record.completion_code = int_col(row, 11)?;
                Ok(record)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut batch = CompletedBatch::default();
        for record in rows {
            match record.to_completed() {
                Ok(job) => batch.jobs.push(job),
                Err(e) => batch.warnings.push(RecordWarning::malformed(
                    None,
                    RecordTable::Completed,
                    record.job_id.as_deref(),
                    &e,
                )),
            }
        }
        Ok(batch)
    }
}

impl SnapshotSource for SnapshotStore {
    type Error = StoreError;

    fn snapshots_in(&self, window: &TimeWindow) -> Result<Vec<Snapshot>, Self::Error> {
        SnapshotStore::snapshots_in(self, window)
    }

    fn load_snapshot(&self, id: &SampleId) -> Result<LoadedSnapshot, Self::Error> {
        SnapshotStore::load_snapshot(self, id)
    }

    fn completed_in(&self, window: &TimeWindow) -> Result<CompletedBatch, Self::Error> {
        SnapshotStore::completed_in(self, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BackfillSample, QueueSample};

    fn job(job_id: &str, procs: i64, start: i64) -> JobRecord {
        JobRecord {
            job_id: Some(job_id.to_string()),
            account: Some("CSC108".to_string()),
            user: Some("doleynik".to_string()),
            class: Some("batch".to_string()),
            job_name: Some("SAGA-Python-PBSJobScript.1".to_string()),
            req_procs: Some(procs),
            req_nodes: None,
            req_walltime: Some(3600),
            start_time: Some(start),
            submission_time: Some(start - 100),
            eligible_elapsed: Some(60),
            completion_time: None,
            completion_code: None,
        }
    }

    fn seeded_store() -> SnapshotStore {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        for (id, time) in [("b", 2000), ("a", 1000), ("c", 3000)] {
            store
                .insert_queue_sample(&QueueSample {
                    sample_id: SampleId::new(id),
                    sample_time: time,
                    active: vec![job("1", 160, time - 500)],
                    eligible: vec![job("2", 64, time)],
                    completed: vec![],
                })
                .unwrap();
            store
                .insert_backfill_sample(&BackfillSample {
                    sample_id: SampleId::new(id),
                    sample_time: time,
                    windows: vec![BackfillRecord {
                        partition: "titan".to_string(),
                        index: 0,
                        proccount: Some(800),
                        nodecount: Some(50),
                        duration: Some(7200),
                        starttime: Some(time),
                    }],
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_snapshots_in_orders_by_time() {
        let store = seeded_store();
        let window = TimeWindow::new(1000, 3000).unwrap();
        let ids: Vec<_> = store
            .snapshots_in(&window)
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_load_snapshot() {
        let store = seeded_store();
        let loaded = store.load_snapshot(&SampleId::new("b")).unwrap();
        assert_eq!(loaded.snapshot.time, 2000);
        assert_eq!(loaded.active.len(), 1);
        assert_eq!(loaded.eligible.len(), 1);
        assert_eq!(loaded.backfill.len(), 1);
        assert!(loaded.is_consistent());
        assert_eq!(
            loaded.current_backfill().map(|w| w.available_processors).collect::<Vec<_>>(),
            vec![800]
        );
    }

    #[test]
    fn test_load_missing_snapshot() {
        let store = seeded_store();
        let err = store.load_snapshot(&SampleId::new("zz")).unwrap_err();
        assert!(matches!(err, StoreError::MissingSnapshot { .. }));
    }

    #[test]
    fn test_malformed_rows_become_warnings() {
        let mut store = seeded_store();
        let mut broken = job("9", 16, 500);
        broken.req_walltime = None;
        store
            .insert_queue_sample(&QueueSample {
                sample_id: SampleId::new("a"),
                sample_time: 1000,
                active: vec![broken],
                eligible: vec![],
                completed: vec![],
            })
            .unwrap();
        let loaded = store.load_snapshot(&SampleId::new("a")).unwrap();
        assert_eq!(loaded.active.len(), 1);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.is_consistent());
    }

    #[test]
    fn test_inconsistent_sample_time_is_flagged() {
        let store = seeded_store();
        store
            .conn
            .execute("UPDATE backfill SET SampleTime = 2001 WHERE SampleID = 'b'", [])
            .unwrap();
        let loaded = store.load_snapshot(&SampleId::new("b")).unwrap();
        assert!(!loaded.is_consistent());
        assert!(loaded.warnings.contains(&RecordWarning::InconsistentJoin {
            sample_id: SampleId::new("b"),
            sample_times: vec![2000, 2001],
        }));
    }

    #[test]
    fn test_text_integers_are_parsed() {
        let store = seeded_store();
        store
            .conn
            .execute(
                "UPDATE active SET ReqAWDuration = '3600.0' WHERE SampleID = 'a'",
                [],
            )
            .unwrap();
        let loaded = store.load_snapshot(&SampleId::new("a")).unwrap();
        assert_eq!(loaded.active[0].requested_walltime, 3600);
    }

    #[test]
    fn test_completed_in_window() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let mut records = Vec::new();
        for (id, start) in [("1", 500), ("2", 1500), ("3", 2500)] {
            let mut record = job(id, 32, start);
            record.completion_time = Some(start + 1000);
            record.completion_code = Some(0);
            records.push(record);
        }
        let mut unfinished = job("4", 32, 1600);
        unfinished.completion_time = None;
        records.push(unfinished);
        store.insert_completed(&records).unwrap();

        let batch = store
            .completed_in(&TimeWindow::new(1000, 3000).unwrap())
            .unwrap();
        let ids: Vec<_> = batch.jobs.iter().map(|j| j.job.job_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(batch.warnings.len(), 1);
    }
}
