//! Import of MOAB showq/showbf XML captures into the snapshot store.

pub mod scan;
pub mod xml;

pub use scan::{ImportSummary, import_capture_dir};
pub use xml::{parse_showbf, parse_showq};

use bfscope_store::StoreError;
use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse capture XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Failed to write capture to store: {0}")]
    Store(#[from] StoreError),
    #[error("Capture directory not found: {0}")]
    NotFound(Utf8PathBuf),
}
