//! Batch summary.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::{FileError, RejectionKind};
use crate::logs::{log_error, log_error_indent, log_info, log_info_indent, log_success, log_warning};
use crate::models::{display_name, TransformResult};

/// A file that produced output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    pub source: PathBuf,
    pub encoding: String,
    /// Why the schema was chosen
    pub outcome: String,
    pub result: TransformResult,
}

impl ProcessedFile {
    pub fn output_name(&self) -> String {
        self.result.output_name()
    }
}

/// A file left out of the output, with the reason.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub file: String,
    pub path: PathBuf,
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    pub fn new(path: impl Into<PathBuf>, error: &FileError) -> Self {
        let path = path.into();
        Self {
            file: display_name(&path),
            path,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a batch, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub discovered: usize,
    pub processed: Vec<ProcessedFile>,
    pub rejected: Vec<Rejection>,
}

impl BatchSummary {
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    /// Rejections of one kind.
    pub fn rejected_as(&self, kind: RejectionKind) -> impl Iterator<Item = &Rejection> {
        self.rejected.iter().filter(move |r| r.kind == kind)
    }

    /// Print totals, per-file outcomes and rejections.
    pub fn log_report(&self) {
        log_info("");
        log_info("📊 Batch summary");
        log_info_indent(format!("Discovered: {}", self.discovered), 1);
        log_info_indent(format!("Processed:  {}", self.processed_count()), 1);
        log_info_indent(format!("Rejected:   {}", self.rejected_count()), 1);

        if !self.processed.is_empty() {
            log_info("");
            for file in &self.processed {
                let d = &file.result.diagnostics;
                log_success(format!(
                    "{} → {} ({} rows, {})",
                    display_name(&file.source),
                    file.output_name(),
                    file.result.rows.len(),
                    file.outcome
                ));
                log_info_indent(
                    format!(
                        "rows removed {:?}, {} columns renamed, {} dates, {} numbers, {} substitutions",
                        d.rows_removed,
                        d.columns_renamed,
                        d.dates_converted,
                        d.numeric_cleanups,
                        d.substitutions
                    ),
                    1,
                );
            }
        }

        if !self.rejected.is_empty() {
            log_info("");
            for rejection in &self.rejected {
                log_error(format!("{} [{}]", rejection.file, rejection.kind));
                log_error_indent(&rejection.message, 1);
            }
        }

        if self.discovered == 0 {
            log_warning("No input files found");
        }
    }
}
