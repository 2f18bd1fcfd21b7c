//! Analysis configuration: a JSON file merged with command-line overrides.

use bfscope_contention::AnalysisParams;
use bfscope_core::{JobSizeBin, TenantSelector, TimeWindow};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },
    #[error("No {0} given; set it in the config file or on the command line")]
    Missing(&'static str),
    #[error("Size bin must be between 1 and 5, got {0}")]
    SizeBin(u8),
    #[error(transparent)]
    Invalid(#[from] bfscope_core::ConfigError),
}

fn default_batch_class() -> String {
    "batch".to_string()
}

fn default_histogram_bins() -> usize {
    50
}

/// A fully resolved analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub store: Utf8PathBuf,
    pub tenant: TenantSelector,
    pub window: TimeWindow,

    #[serde(default = "default_batch_class")]
    pub batch_class: String,

    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    #[serde(default)]
    pub size_bin: Option<JobSizeBin>,
}

/// Configuration file contents; every field may be left to the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub store: Option<Utf8PathBuf>,
    pub tenant: Option<TenantSelector>,
    pub window: Option<TimeWindow>,
    pub batch_class: Option<String>,
    pub histogram_bins: Option<usize>,
    pub size_bin: Option<JobSizeBin>,
}

impl ConfigFile {
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, otherwise start from an empty file.
    pub fn load_optional(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// The store location, with `--db` taking precedence.
    pub fn store(&self, flag: Option<&Utf8Path>) -> Result<Utf8PathBuf, ConfigError> {
        flag.map(Utf8Path::to_path_buf)
            .or_else(|| self.store.clone())
            .ok_or(ConfigError::Missing("store (--db)"))
    }
}

/// Command-line values that replace the matching file values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub store: Option<Utf8PathBuf>,
    pub account: Option<String>,
    pub user: Option<String>,
    pub job_name: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub histogram_bins: Option<usize>,

    /// 1-based size bin number
    pub size_bin: Option<u8>,
}

impl AnalysisConfig {
    /// Merge a configuration file with overrides and check the result.
    ///
    /// Tenant and window fields are overridden one at a time, so `--end`
    /// alone keeps the file's start.
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> Result<Self, ConfigError> {
        let store = file.store(overrides.store.as_deref())?;

        let file_tenant = file.tenant.as_ref();
        let account = overrides
            .account
            .or_else(|| file_tenant.map(|t| t.account.clone()))
            .ok_or(ConfigError::Missing("tenant account (--account)"))?;
        let user = overrides
            .user
            .or_else(|| file_tenant.map(|t| t.user.clone()))
            .ok_or(ConfigError::Missing("tenant user (--user)"))?;
        let job_name_pattern = overrides
            .job_name
            .or_else(|| file_tenant.and_then(|t| t.job_name_pattern.clone()));

        let start = overrides
            .start
            .or(file.window.map(|w| w.start))
            .ok_or(ConfigError::Missing("window start (--start)"))?;
        let end = overrides
            .end
            .or(file.window.map(|w| w.end))
            .ok_or(ConfigError::Missing("window end (--end)"))?;

        let size_bin = overrides
            .size_bin
            .map(|n| JobSizeBin::from_number(n).ok_or(ConfigError::SizeBin(n)))
            .transpose()?
            .or(file.size_bin);

        let config = Self {
            store,
            tenant: TenantSelector {
                account,
                user,
                job_name_pattern,
            },
            window: TimeWindow::new(start, end)?,
            batch_class: file.batch_class.unwrap_or_else(default_batch_class),
            histogram_bins: overrides
                .histogram_bins
                .or(file.histogram_bins)
                .unwrap_or_else(default_histogram_bins),
            size_bin,
        };
        Ok(config)
    }

    /// Compile the tenant selector into classifier parameters.
    pub fn params(&self) -> Result<AnalysisParams, ConfigError> {
        self.window.validate()?;
        let mut params = AnalysisParams::new(self.tenant.compile()?, self.window);
        params.batch_class = self.batch_class.clone();
        params.histogram_bins = self.histogram_bins;
        params.size_bin = self.size_bin;
        Ok(params)
    }
}
