//! Job-name glob patterns.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid job-name pattern {pattern:?}: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compile a shell-style glob into an anchored regex.
///
/// `*` matches any run of characters and `?` a single character; everything
/// else is literal, so `SAGA-Python-PBSJobScript.*` matches names with that
/// exact prefix.
pub fn glob_to_regex(glob: &str) -> Result<Regex, PatternError> {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push('^');
    for c in glob.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|source| PatternError::Invalid {
        pattern: glob.to_string(),
        source,
    })
}
