//! SQLite snapshot store for bfscope.
//!
//! Holds the time-indexed `active`, `eligible`, `backfill` tables keyed by
//! SampleID, the append-only `completed` table, and capture-file
//! bookkeeping for idempotent imports.

pub mod loader;
pub mod schema;
pub mod store;

pub use schema::CaptureKind;
pub use store::{BackfillSample, InsertSummary, QueueSample, SnapshotStore, StoreError};
