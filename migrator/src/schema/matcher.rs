//! Schema matching - resolve which schema applies to a candidate file.
//!
//! Resolution runs in two passes. The file's base name gives a hint (it
//! starts with a schema name); the header row is then compared with the
//! declared columns. Structure always has the last word: a hint whose header
//! does not fit is reported as a conflict when another schema fits, and as a
//! mismatch otherwise.

use std::collections::HashSet;

use super::{SchemaDefinition, SchemaRegistry};
use crate::error::{FileError, FileResult};
use crate::models::CandidateFile;

/// Number of leading characters compared between file and declared headers.
pub const PREFIX_LEN: usize = 6;

/// Result of comparing one header row with one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCheck {
    Match,
    /// All present names fit, but some declared columns are missing.
    TooFewColumns { required: usize, found: usize },
    /// Extra trailing columns on a schema without wildcard.
    TooManyColumns { allowed: usize, found: usize },
    NameDiffers {
        position: usize,
        expected: String,
        found: String,
    },
    /// The schema's header row does not exist in the file.
    NoHeaderRow { row: usize },
}

impl HeaderCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, HeaderCheck::Match)
    }

    /// Human-readable reason, empty for a match.
    pub fn describe(&self) -> String {
        match self {
            HeaderCheck::Match => String::new(),
            HeaderCheck::TooFewColumns { required, found } => {
                format!("{} columns required, {} found", required, found)
            }
            HeaderCheck::TooManyColumns { allowed, found } => {
                format!("{} columns allowed, {} found", allowed, found)
            }
            HeaderCheck::NameDiffers { position, expected, found } => {
                format!("column {}: expected '{}', found '{}'", position, expected, found)
            }
            HeaderCheck::NoHeaderRow { row } => format!("file has no row {}", row),
        }
    }
}

/// Compare a header row with a schema's declared columns.
///
/// Names are compared trimmed and upper-cased on their first
/// `min(PREFIX_LEN, declared length)` characters. Trailing empty header cells
/// are not counted as columns.
pub fn check_header(schema: &SchemaDefinition, header: &[String]) -> HeaderCheck {
    let header = trim_trailing_empty(header);
    let required = schema.required_count();
    let found = header.len();

    for (idx, (expected, actual)) in schema.columns().iter().zip(header).enumerate() {
        if !prefix_eq(expected, actual) {
            return HeaderCheck::NameDiffers {
                position: idx + 1,
                expected: expected.clone(),
                found: actual.trim().to_string(),
            };
        }
    }

    if found < required {
        HeaderCheck::TooFewColumns { required, found }
    } else if !schema.wildcard() && found > required {
        HeaderCheck::TooManyColumns {
            allowed: required,
            found,
        }
    } else {
        HeaderCheck::Match
    }
}

/// Header without trailing empty names.
pub fn trim_trailing_empty(header: &[String]) -> &[String] {
    let len = header
        .iter()
        .rposition(|h| !h.trim().is_empty())
        .map_or(0, |p| p + 1);
    &header[..len]
}

fn prefix_eq(expected: &str, actual: &str) -> bool {
    let n = expected.chars().count().min(PREFIX_LEN);
    let left: String = expected.chars().take(n).collect::<String>().to_uppercase();
    let right: String = actual.trim().chars().take(n).collect::<String>().to_uppercase();
    left == right
}

/// Why a schema was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome<'a> {
    /// File name and header both point to this schema.
    MatchedByName(&'a SchemaDefinition),
    /// No name hint; the header fits this schema.
    MatchedByStructure(&'a SchemaDefinition),
    /// The name hinted one schema but the header fits another, which wins.
    Conflict {
        hinted: &'a SchemaDefinition,
        resolved: &'a SchemaDefinition,
    },
}

impl<'a> MatchOutcome<'a> {
    /// The schema to apply.
    pub fn schema(&self) -> &'a SchemaDefinition {
        match *self {
            MatchOutcome::MatchedByName(s) | MatchOutcome::MatchedByStructure(s) => s,
            MatchOutcome::Conflict { resolved, .. } => resolved,
        }
    }

    /// Short explanation for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            MatchOutcome::MatchedByName(s) => format!("matched '{}' by name and header", s.name()),
            MatchOutcome::MatchedByStructure(s) => format!("matched '{}' by header", s.name()),
            MatchOutcome::Conflict { hinted, resolved } => format!(
                "name suggests '{}' but header matches '{}', using '{}'",
                hinted.name(),
                resolved.name(),
                resolved.name()
            ),
        }
    }
}

/// Resolves candidate files against a registry.
#[derive(Debug, Clone, Copy)]
pub struct SchemaMatcher<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> SchemaMatcher<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Name pass: schema whose name starts the base name, case-insensitive.
    /// The longest matching name wins.
    pub fn name_hint(&self, stem: &str) -> Option<&'a SchemaDefinition> {
        let stem = stem.trim().to_uppercase();
        self.registry
            .iter()
            .filter(|s| stem.starts_with(&s.name().to_uppercase()))
            .fold(None, |best: Option<&'a SchemaDefinition>, s| match best {
                Some(b) if b.name().len() >= s.name().len() => Some(b),
                _ => Some(s),
            })
    }

    /// Compare the file against one schema, using that schema's header row.
    pub fn check(&self, schema: &SchemaDefinition, file: &CandidateFile) -> HeaderCheck {
        match file.header_at(schema.header_row()) {
            Some(header) => check_header(schema, &header),
            None => HeaderCheck::NoHeaderRow {
                row: schema.header_row(),
            },
        }
    }

    /// Structural pass: first schema in declaration order whose header fits,
    /// skipping `exclude` (names already produced in this batch).
    pub fn structural(
        &self,
        file: &CandidateFile,
        exclude: &HashSet<String>,
    ) -> Option<&'a SchemaDefinition> {
        self.registry
            .iter()
            .filter(|s| !exclude.contains(s.name()))
            .find(|s| self.check(s, file).is_match())
    }

    /// Resolve a file to a schema.
    ///
    /// Errors: `InsufficientColumns` when the closest candidate only lacks
    /// columns, `SchemaMismatch` when the name hint is contradicted and
    /// nothing else fits, `SchemaNotFound` otherwise.
    pub fn resolve(
        &self,
        file: &CandidateFile,
        exclude: &HashSet<String>,
    ) -> FileResult<MatchOutcome<'a>> {
        let hint = self.name_hint(&file.stem());

        let hint_check = match hint {
            Some(hinted) => {
                let check = self.check(hinted, file);
                if check.is_match() {
                    return Ok(MatchOutcome::MatchedByName(hinted));
                }
                Some((hinted, check))
            }
            None => None,
        };

        let mut others = exclude.clone();
        if let Some(hinted) = hint {
            others.insert(hinted.name().to_string());
        }
        if let Some(resolved) = self.structural(file, &others) {
            return Ok(match hint {
                Some(hinted) => MatchOutcome::Conflict { hinted, resolved },
                None => MatchOutcome::MatchedByStructure(resolved),
            });
        }

        match hint_check {
            Some((hinted, HeaderCheck::TooFewColumns { required, found })) => {
                Err(FileError::InsufficientColumns {
                    schema: hinted.name().to_string(),
                    required,
                    found,
                })
            }
            Some((hinted, check)) => Err(FileError::SchemaMismatch {
                schema: hinted.name().to_string(),
                reason: check.describe(),
            }),
            None => match self.closest_truncated(file, exclude) {
                Some((schema, required, found)) => Err(FileError::InsufficientColumns {
                    schema: schema.name().to_string(),
                    required,
                    found,
                }),
                None => Err(FileError::SchemaNotFound {
                    file: file.file_name(),
                }),
            },
        }
    }

    /// Schema whose declared columns the file follows but cuts short,
    /// preferring the one with the most columns present.
    fn closest_truncated(
        &self,
        file: &CandidateFile,
        exclude: &HashSet<String>,
    ) -> Option<(&'a SchemaDefinition, usize, usize)> {
        self.registry
            .iter()
            .filter(|s| !exclude.contains(s.name()))
            .filter_map(|s| match self.check(s, file) {
                HeaderCheck::TooFewColumns { required, found } if found > 0 => {
                    Some((s, required, found))
                }
                _ => None,
            })
            .fold(None, |best: Option<(&'a SchemaDefinition, usize, usize)>, cand| match best {
                Some(b) if b.2 >= cand.2 => Some(b),
                _ => Some(cand),
            })
    }
}
