//! Per-row / per-cell error accumulation
//!
//! An [`ErrorReport`] is created once per publish run, appended to by the
//! mapping generator (warnings) and the RDF generator (row failures), and
//! handed back to the caller intact whether or not the run succeeded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How bad a report entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One failure that did not abort the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Zero-based data row index, `None` for mapping-level warnings
    #[serde(rename = "row")]
    pub row_index: Option<usize>,
    /// Column the entry is about, if any
    #[serde(rename = "column")]
    pub column_id: Option<String>,
    pub message: String,
    pub severity: Severity,
}

/// Append-only list of non-fatal failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorReport {
    entries: Vec<ReportEntry>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed cell. The offending triple has been skipped.
    pub fn row_error(
        &mut self,
        row_index: usize,
        column_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        let entry = ReportEntry {
            row_index: Some(row_index),
            column_id: Some(column_id.into()),
            message: message.into(),
            severity: Severity::Error,
        };
        tracing::debug!(
            row = row_index,
            column = entry.column_id.as_deref(),
            message = %entry.message,
            "row mapping error"
        );
        self.entries.push(entry);
    }

    /// Record a warning that is not tied to a particular row
    pub fn warning(&mut self, column_id: Option<String>, message: impl Into<String>) {
        self.entries.push(ReportEntry {
            row_index: None,
            column_id,
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    /// Entries concerning one row, in the order they were recorded
    pub fn for_row(&self, row_index: usize) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(move |e| e.row_index == Some(row_index))
    }

    /// Move every entry of `other` to the end of this report
    pub fn extend(&mut self, other: ErrorReport) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        )?;
        for entry in &self.entries {
            let row = entry
                .row_index
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            let column = entry.column_id.as_deref().unwrap_or("-");
            writeln!(
                f,
                "  [{}] row {} column {}: {}",
                entry.severity, row, column, entry.message
            )?;
        }
        Ok(())
    }
}
