//! Tenant and time-window selection.

use crate::types::ActiveJob;
use bfscope_parsers::{PatternError, format_epoch, glob_to_regex};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Tenant selector needs a non-empty {0}")]
    EmptyField(&'static str),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("Time window start {start} is not before end {end}")]
    InvalidWindow { start: i64, end: i64 },
}

/// The account/user pair whose backfill usage is under study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSelector {
    pub account: String,
    pub user: String,

    /// Job-name glob restricting which of the tenant's jobs count
    #[serde(default)]
    pub job_name_pattern: Option<String>,
}

impl TenantSelector {
    pub fn new(account: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            user: user.into(),
            job_name_pattern: None,
        }
    }

    pub fn with_job_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.job_name_pattern = Some(pattern.into());
        self
    }

    /// Validate the selector and compile its job-name pattern.
    pub fn compile(&self) -> Result<TenantMatcher, ConfigError> {
        if self.account.trim().is_empty() {
            return Err(ConfigError::EmptyField("account"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::EmptyField("user"));
        }
        let pattern = self
            .job_name_pattern
            .as_deref()
            .map(glob_to_regex)
            .transpose()?;
        Ok(TenantMatcher {
            selector: self.clone(),
            pattern,
        })
    }
}

impl fmt::Display for TenantSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.user)?;
        if let Some(pattern) = &self.job_name_pattern {
            write!(f, " [{}]", pattern)?;
        }
        Ok(())
    }
}

/// A compiled [`TenantSelector`].
#[derive(Debug, Clone)]
pub struct TenantMatcher {
    selector: TenantSelector,
    pattern: Option<Regex>,
}

impl TenantMatcher {
    pub fn selector(&self) -> &TenantSelector {
        &self.selector
    }

    /// Whether a job with these attributes belongs to the tenant.
    pub fn matches(&self, account: &str, user: &str, job_name: &str) -> bool {
        account == self.selector.account
            && user == self.selector.user
            && self
                .pattern
                .as_ref()
                .is_none_or(|re| re.is_match(job_name))
    }

    pub fn matches_job(&self, job: &ActiveJob) -> bool {
        self.matches(&job.account, &job.user, &job.job_name)
    }
}

/// Half-open `[start, end)` interval in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Result<Self, ConfigError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Check the bounds of a window built by deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start >= self.end {
            return Err(ConfigError::InvalidWindow {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && t < self.end
    }

    pub fn len_seconds(&self) -> i64 {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}) UTC",
            format_epoch(self.start),
            format_epoch(self.end)
        )
    }
}
