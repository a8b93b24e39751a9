//! Ordered, dismissible list of errors shown to the user.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::error::Error as _;

/// Normalized error handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl From<&ApiError> for ErrorReport {
    fn from(err: &ApiError) -> Self {
        let report = ErrorReport::new(err.to_string());
        match err.source() {
            Some(source) => report.with_cause(source.to_string()),
            None => report,
        }
    }
}

impl From<&str> for ErrorReport {
    fn from(message: &str) -> Self {
        ErrorReport::new(message)
    }
}

impl From<String> for ErrorReport {
    fn from(message: String) -> Self {
        ErrorReport::new(message)
    }
}

/// Errors in insertion order; no de-duplication.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorLog {
    entries: Vec<ErrorReport>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: impl Into<ErrorReport>) {
        self.entries.push(report.into());
    }

    /// Remove the entry at `index`; out-of-range indexes are ignored.
    pub fn dismiss(&mut self, index: usize) -> Option<ErrorReport> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn entries(&self) -> &[ErrorReport] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
