//! Schema definitions and constants

use crate::store::StoreError;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Table names
pub mod tables {
    pub const SAMPLES: &str = "samples";
    pub const ACTIVE: &str = "active";
    pub const ELIGIBLE: &str = "eligible";
    pub const BACKFILL: &str = "backfill";
    pub const COMPLETED: &str = "completed";
    pub const CAPTURE_FILES: &str = "capture_files";
}

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS samples (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        SampleID TEXT NOT NULL UNIQUE,
        SampleTime INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS samples_time ON samples (SampleTime);

    CREATE TABLE IF NOT EXISTS active (
        SampleID TEXT NOT NULL,
        SampleTime INTEGER NOT NULL,
        JobID TEXT NOT NULL,
        Account TEXT,
        User TEXT,
        Class TEXT,
        JobName TEXT,
        ReqProcs INTEGER,
        ReqNodes INTEGER,
        ReqAWDuration INTEGER,
        StartTime INTEGER,
        SubmissionTime INTEGER,
        UNIQUE (SampleID, JobID)
    );
    CREATE INDEX IF NOT EXISTS active_account ON active (Account, User);

    CREATE TABLE IF NOT EXISTS eligible (
        SampleID TEXT NOT NULL,
        SampleTime INTEGER NOT NULL,
        JobID TEXT NOT NULL,
        Account TEXT,
        User TEXT,
        Class TEXT,
        JobName TEXT,
        ReqProcs INTEGER,
        ReqNodes INTEGER,
        ReqAWDuration INTEGER,
        SubmissionTime INTEGER,
        EEDuration INTEGER,
        UNIQUE (SampleID, JobID)
    );

    CREATE TABLE IF NOT EXISTS backfill (
        SampleID TEXT NOT NULL,
        SampleTime INTEGER NOT NULL,
        Partition TEXT NOT NULL,
        idx INTEGER NOT NULL,
        proccount INTEGER,
        nodecount INTEGER,
        duration INTEGER,
        starttime INTEGER,
        UNIQUE (SampleID, Partition, idx)
    );

    CREATE TABLE IF NOT EXISTS completed (
        JobID TEXT PRIMARY KEY,
        Account TEXT,
        User TEXT,
        Class TEXT,
        JobName TEXT,
        ReqProcs INTEGER,
        ReqNodes INTEGER,
        ReqAWDuration INTEGER,
        StartTime INTEGER,
        SubmissionTime INTEGER,
        CompletionTime INTEGER,
        CompletionCode INTEGER
    );
    CREATE INDEX IF NOT EXISTS completed_start ON completed (StartTime);

    CREATE TABLE IF NOT EXISTS capture_files (
        kind TEXT NOT NULL,
        outfilename TEXT NOT NULL,
        errfilecontents TEXT,
        UNIQUE (kind, outfilename)
    );
"#;

/// Capture command a file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Showq,
    Showbf,
}

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::Showq => "showq",
            CaptureKind::Showbf => "showbf",
        }
    }
}

/// Create the schema if needed and refuse stores written by a newer version.
pub fn init(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version > SCHEMA_VERSION {
        return Err(StoreError::SchemaVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    conn.execute_batch(SCHEMA_SQL)?;

    if version < SCHEMA_VERSION {
        info!(from = version, to = SCHEMA_VERSION, "Initialized store schema");
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else {
        debug!(version, "Store schema up to date");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_init_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            init(&conn),
            Err(StoreError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn test_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        for table in [
            tables::SAMPLES,
            tables::ACTIVE,
            tables::ELIGIBLE,
            tables::BACKFILL,
            tables::COMPLETED,
            tables::CAPTURE_FILES,
        ] {
            let n: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(n, 1, "missing table {table}");
        }
    }
}
