use std::path::{Path, PathBuf};

use crate::error::{ConversionError, ConversionResult};

/// Per-file tolerance for recoverable errors.
///
/// Every recoverable failure (undecodable line, row arity mismatch, unparsable value) is
/// recorded against the budget of the file it came from. With `max_error = n >= 0` the file
/// tolerates `n` failures and aborts on failure `n + 1`; `max_error = -1` never aborts.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    path: PathBuf,
    max_error: i64,
    count: usize,
}

impl ErrorBudget {
    /// Fresh budget for `path`.
    pub fn new(path: impl AsRef<Path>, max_error: i64) -> Self {
        Self::resume(path, max_error, 0)
    }

    /// Budget that already spent `count` errors (e.g. while reading the file).
    pub fn resume(path: impl AsRef<Path>, max_error: i64, count: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_error,
            count,
        }
    }

    /// Errors recorded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the budget is unlimited.
    pub fn is_unlimited(&self) -> bool {
        self.max_error < 0
    }

    /// Record one recoverable error found at `line` (1-based, if known).
    ///
    /// Returns [`ConversionError::MaxErrorExceeded`] once the tolerance is used up.
    pub fn record(&mut self, line: Option<u64>, error: &ConversionError) -> ConversionResult<()> {
        self.count += 1;
        tracing::warn!(
            path = %self.path.display(),
            line,
            errors = self.count,
            error = %error,
            "skipping malformed line"
        );

        if !self.is_unlimited() && self.count as i64 > self.max_error {
            return Err(ConversionError::MaxErrorExceeded {
                path: self.path.clone(),
                errors: self.count,
                max_error: self.max_error,
            });
        }
        Ok(())
    }
}
