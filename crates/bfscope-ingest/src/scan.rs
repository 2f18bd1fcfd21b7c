//! Incremental import of a capture directory.

use crate::IngestError;
use crate::xml::{parse_showbf, parse_showq};
use bfscope_core::SampleId;
use bfscope_store::{CaptureKind, SnapshotStore};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

const OUT_SUFFIX: &str = "-out.xml";
const ERR_SUFFIX: &str = "-err.xml";

/// Result of importing a capture directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// `-out.xml` files found
    pub files_seen: usize,
    /// Files already recorded by an earlier import
    pub files_skipped: usize,
    /// Captures whose records were written to the store
    pub samples_imported: usize,
    /// Captures with an empty output file (the poll failed)
    pub empty_captures: usize,
    /// Files that could not be read or parsed; retried next run
    pub failed: usize,
}

impl ImportSummary {
    fn merge(&mut self, other: ImportSummary) {
        self.files_seen += other.files_seen;
        self.files_skipped += other.files_skipped;
        self.samples_imported += other.samples_imported;
        self.empty_captures += other.empty_captures;
        self.failed += other.failed;
    }
}

/// Import every not-yet-seen capture under `data_dir/showq` and `data_dir/showbf`.
pub fn import_capture_dir(
    store: &mut SnapshotStore,
    data_dir: &Utf8Path,
) -> Result<ImportSummary, IngestError> {
    if !data_dir.is_dir() {
        return Err(IngestError::NotFound(data_dir.to_owned()));
    }

    let mut summary = ImportSummary::default();
    for kind in [CaptureKind::Showq, CaptureKind::Showbf] {
        summary.merge(import_kind(store, data_dir, kind)?);
    }

    info!(
        seen = summary.files_seen,
        skipped = summary.files_skipped,
        imported = summary.samples_imported,
        empty = summary.empty_captures,
        failed = summary.failed,
        "Capture import finished"
    );
    Ok(summary)
}

/// Sorted `-out.xml` file names in `dir`.
fn out_files(dir: &Utf8Path) -> Result<Vec<String>, IngestError> {
    let mut names = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let name = entry.file_name();
        if name.starts_with('.') || !name.ends_with(OUT_SUFFIX) {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();
    Ok(names)
}

fn import_kind(
    store: &mut SnapshotStore,
    data_dir: &Utf8Path,
    kind: CaptureKind,
) -> Result<ImportSummary, IngestError> {
    let dir = data_dir.join(kind.as_str());
    let mut summary = ImportSummary::default();

    if !dir.is_dir() {
        debug!(%dir, "No capture directory");
        return Ok(summary);
    }

    let seen = store.imported_capture_files(kind)?;

    for name in out_files(&dir)? {
        summary.files_seen += 1;
        if seen.contains(&name) {
            summary.files_skipped += 1;
            continue;
        }

        let path = dir.join(&name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read capture file {}: {}", path, e);
                summary.failed += 1;
                continue;
            }
        };

        if text.trim().is_empty() {
            let err_text = read_err_file(&err_path(&dir, &name));
            store.record_capture_file(kind, &name, err_text.as_deref())?;
            summary.empty_captures += 1;
            continue;
        }

        let sample_id = SampleId::new(&name[..name.len() - OUT_SUFFIX.len()]);
        let imported = match kind {
            CaptureKind::Showq => match parse_showq(&sample_id, &text) {
                Ok(Some(sample)) => {
                    store.insert_queue_sample(&sample)?;
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    // Don't record failed parses - retry next time
                    warn!("Failed to parse capture file {}: {}", path, e);
                    summary.failed += 1;
                    continue;
                }
            },
            CaptureKind::Showbf => match parse_showbf(&sample_id, &text) {
                Ok(Some(sample)) => {
                    store.insert_backfill_sample(&sample)?;
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("Failed to parse capture file {}: {}", path, e);
                    summary.failed += 1;
                    continue;
                }
            },
        };

        if imported {
            summary.samples_imported += 1;
            debug!(%sample_id, kind = kind.as_str(), "Imported capture");
        } else {
            warn!("Capture file {} has no sample time, skipping", path);
        }
        store.record_capture_file(kind, &name, None)?;
    }

    Ok(summary)
}

fn err_path(dir: &Utf8Path, out_name: &str) -> Utf8PathBuf {
    let stem = &out_name[..out_name.len() - OUT_SUFFIX.len()];
    dir.join(format!("{stem}{ERR_SUFFIX}"))
}

/// Contents of a poll's stderr capture, if it exists and has any.
fn read_err_file(path: &Utf8Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!("No readable error capture {}: {}", path, e);
            None
        }
    }
}
