//! Batch orchestration.
//!
//! Runs every discovered file through reading, schema resolution and
//! transformation. A rejected file is recorded and the batch goes on; only
//! configuration errors stop a run, and those happen before the batch.
//!
//! Files whose name points to a schema go first. Each schema is produced at
//! most once per batch: later files resolving to it are rejected.

pub mod delivery;
pub mod files;
pub mod summary;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{FileError, FileResult};
use crate::logs::{log_error_indent, log_info, log_info_indent, log_success, log_warning};
use crate::models::{display_name, CandidateFile, SourceKind};
use crate::parser::{read_candidate, InputDelimiter};
use crate::replace::ReplacementTable;
use crate::schema::{MatchOutcome, SchemaMatcher, SchemaRegistry};
use crate::transform::{OutputOptions, Transformer};

pub use delivery::{Delivery, DeliveryReport};
pub use files::{clean_output_dir, discover, list_outputs, remove_inputs, write_outputs, Discovered};
pub use summary::{BatchSummary, ProcessedFile, Rejection};

/// Sequences reading, matching and transformation for a batch.
pub struct Migrator<'a> {
    matcher: SchemaMatcher<'a>,
    transformer: Transformer<'a>,
    kind: SourceKind,
    delimiter: InputDelimiter,
}

impl<'a> Migrator<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        replacements: &'a ReplacementTable,
        output: OutputOptions,
        kind: SourceKind,
        delimiter: InputDelimiter,
    ) -> Self {
        Self {
            matcher: SchemaMatcher::new(registry),
            transformer: Transformer::new(replacements, output),
            kind,
            delimiter,
        }
    }

    /// Process a batch. Never fails: every file ends up processed or rejected.
    pub fn run_batch(&self, discovered: Discovered) -> BatchSummary {
        let mut summary = BatchSummary {
            discovered: discovered.len(),
            ..Default::default()
        };
        summary.rejected.extend(discovered.unreadable);

        let mut files = discovered.files;
        // Stable: discovery order is kept within each group
        files.sort_by_key(|(path, _)| self.name_hint(path).is_none());

        // schema name -> file that produced it
        let mut claimed: HashMap<String, String> = HashMap::new();

        for (path, bytes) in files {
            log_info(format!("📄 Processing: {}", display_name(&path)));
            match self.process_file(&path, &bytes, &claimed) {
                Ok(processed) => {
                    log_success(format!(
                        "{} → {} ({} rows)",
                        display_name(&path),
                        processed.output_name(),
                        processed.result.rows.len()
                    ));
                    claimed.insert(processed.result.schema.clone(), display_name(&path));
                    summary.processed.push(processed);
                }
                Err(error) => {
                    log_error_indent(format!("Rejected ({}): {}", error.kind(), error), 1);
                    summary.rejected.push(Rejection::new(path, &error));
                }
            }
        }

        summary
    }

    /// Read, resolve and transform one file.
    ///
    /// `claimed` maps schemas already produced in this batch to the file
    /// that produced them.
    pub fn process_file(
        &self,
        path: &Path,
        bytes: &[u8],
        claimed: &HashMap<String, String>,
    ) -> FileResult<ProcessedFile> {
        let candidate = read_candidate(path, bytes, self.kind, self.delimiter)?;
        log_info_indent(
            format!("encoding {}, {} rows", candidate.encoding, candidate.rows.len()),
            1,
        );

        let exclude: HashSet<String> = claimed.keys().cloned().collect();
        let outcome = match self.matcher.resolve(&candidate, &exclude) {
            Ok(outcome) => outcome,
            Err(FileError::SchemaNotFound { file }) => {
                // The header may fit a schema this batch already produced
                return Err(self
                    .already_claimed(&candidate, claimed)
                    .unwrap_or(FileError::SchemaNotFound { file }));
            }
            Err(e) => return Err(e),
        };
        let schema = outcome.schema();

        if let Some(previous) = claimed.get(schema.name()) {
            return Err(FileError::SchemaAlreadyClaimed {
                schema: schema.name().to_string(),
                claimed_by: previous.clone(),
            });
        }

        if let MatchOutcome::Conflict { .. } = outcome {
            log_warning(outcome.describe());
        } else {
            log_info_indent(outcome.describe(), 1);
        }

        let result = self.transformer.transform(&candidate, schema)?;
        Ok(ProcessedFile {
            source: path.to_path_buf(),
            encoding: candidate.encoding,
            outcome: outcome.describe(),
            result,
        })
    }

    fn already_claimed(
        &self,
        candidate: &CandidateFile,
        claimed: &HashMap<String, String>,
    ) -> Option<FileError> {
        let schema = self.matcher.structural(candidate, &HashSet::new())?;
        claimed
            .get(schema.name())
            .map(|previous| FileError::SchemaAlreadyClaimed {
                schema: schema.name().to_string(),
                claimed_by: previous.clone(),
            })
    }

    fn name_hint(&self, path: &Path) -> Option<&str> {
        let stem = path.file_stem()?.to_str()?;
        self.matcher.name_hint(stem).map(|s| s.name())
    }
}
