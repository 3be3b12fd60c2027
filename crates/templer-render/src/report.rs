//! Outcome of a render pass

use indexmap::IndexMap;
use std::path::PathBuf;

use crate::error::RenderError;

/// Render outcomes collected across units and manifests
///
/// Failures are grouped by the file they concern: the template source for
/// unit failures, the definition for manifest failures.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Errors grouped by file (IndexMap preserves insertion order)
    pub errors_by_file: IndexMap<String, Vec<RenderError>>,

    /// Destination files written
    pub written: Vec<PathBuf>,

    /// Total error count
    pub total_errors: usize,
}

impl RenderReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error for a specific file
    pub fn add_error(&mut self, file: impl Into<String>, error: RenderError) {
        self.errors_by_file.entry(file.into()).or_default().push(error);
        self.total_errors += 1;
    }

    /// Record a written destination
    pub fn add_success(&mut self, destination: PathBuf) {
        self.written.push(destination);
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: RenderReport) {
        for (file, errors) in other.errors_by_file {
            self.errors_by_file.entry(file).or_default().extend(errors);
        }
        self.written.extend(other.written);
        self.total_errors += other.total_errors;
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn is_success(&self) -> bool {
        !self.has_errors()
    }

    /// Get count of files with errors
    pub fn files_with_errors(&self) -> usize {
        self.errors_by_file.len()
    }

    /// Generate summary message: "2 errors in 1 file"
    pub fn summary(&self) -> String {
        let file_word = if self.files_with_errors() == 1 {
            "file"
        } else {
            "files"
        };
        let error_word = if self.total_errors == 1 {
            "error"
        } else {
            "errors"
        };
        format!(
            "{} {} in {} {}",
            self.total_errors,
            error_word,
            self.files_with_errors(),
            file_word
        )
    }
}
