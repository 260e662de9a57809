//! Error types for the migration pipeline.
//!
//! The hierarchy mirrors the propagation policy of the tool:
//!
//! - [`ConfigError`] - configuration errors, fatal for the whole batch
//! - [`FileError`] - per-file rejections, recovered by the orchestrator
//! - [`TransportError`] - delivery errors
//! - [`MigrationError`] - top-level errors returned to the CLI
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading schema definitions, replacements or settings.
///
/// Any of these aborts the batch before the first file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration source.
    #[error("Cannot read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Source is not valid JSON or does not deserialize.
    #[error("Invalid JSON in '{path}': {message}")]
    Json { path: String, message: String },

    /// Source violates its embedded JSON Schema.
    #[error("'{path}' does not follow the expected layout: {}", errors.join("; "))]
    Layout { path: String, errors: Vec<String> },

    /// A schema definition is inconsistent.
    #[error("Schema '{schema}': {message}")]
    InvalidSchema { schema: String, message: String },

    /// Replacement table is inconsistent.
    #[error("Replacement table: {0}")]
    InvalidReplacement(String),

    /// A setting has an unusable value.
    #[error("Invalid setting {name}={value}: {message}")]
    InvalidSetting {
        name: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// File Rejections
// =============================================================================

/// Machine-readable tag of a rejection, carried in the batch summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Encoding,
    SchemaNotFound,
    SchemaMismatch,
    InsufficientColumns,
    InvalidDateValue,
    FieldCountMismatch,
    EmptyFile,
    Parse,
    UnsupportedFormat,
    SchemaAlreadyClaimed,
    Io,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Encoding => "encoding",
            Self::SchemaNotFound => "schema not found",
            Self::SchemaMismatch => "schema mismatch",
            Self::InsufficientColumns => "insufficient columns",
            Self::InvalidDateValue => "invalid date value",
            Self::FieldCountMismatch => "field count mismatch",
            Self::EmptyFile => "empty file",
            Self::Parse => "parse",
            Self::UnsupportedFormat => "unsupported format",
            Self::SchemaAlreadyClaimed => "schema already claimed",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}

/// Errors that reject a single file. The batch continues with the next one.
#[derive(Debug, Error)]
pub enum FileError {
    /// Bytes could not be decoded, or decoded text shows corruption.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// No registered schema matches the file by name or structure.
    #[error("No schema matches file '{file}'")]
    SchemaNotFound { file: String },

    /// The file's structure contradicts the schema it was pointed to.
    #[error("File does not fit schema '{schema}': {reason}")]
    SchemaMismatch { schema: String, reason: String },

    /// Fewer columns than the schema requires.
    #[error("Schema '{schema}' requires {required} columns, file has {found}")]
    InsufficientColumns {
        schema: String,
        required: usize,
        found: usize,
    },

    /// A declared date column holds something that is not a date.
    #[error("Invalid date in column '{column}' at row {row}: '{value}'")]
    InvalidDateValue {
        column: String,
        row: usize,
        value: String,
    },

    /// Serialized output does not have the expected number of fields.
    #[error("Output row {row} has {found} fields, expected {expected}")]
    FieldCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Nothing to process.
    #[error("File is empty")]
    EmptyFile,

    /// Content could not be parsed.
    #[error("Cannot parse file: {0}")]
    Parse(String),

    /// Content does not belong to the selected processing mode.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Another file of this batch already produced this schema.
    #[error("Schema '{schema}' was already produced from '{claimed_by}'")]
    SchemaAlreadyClaimed { schema: String, claimed_by: String },

    /// Reading or writing failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileError {
    /// Tag used in reports.
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::Encoding(_) => RejectionKind::Encoding,
            Self::SchemaNotFound { .. } => RejectionKind::SchemaNotFound,
            Self::SchemaMismatch { .. } => RejectionKind::SchemaMismatch,
            Self::InsufficientColumns { .. } => RejectionKind::InsufficientColumns,
            Self::InvalidDateValue { .. } => RejectionKind::InvalidDateValue,
            Self::FieldCountMismatch { .. } => RejectionKind::FieldCountMismatch,
            Self::EmptyFile => RejectionKind::EmptyFile,
            Self::Parse(_) => RejectionKind::Parse,
            Self::UnsupportedFormat(_) => RejectionKind::UnsupportedFormat,
            Self::SchemaAlreadyClaimed { .. } => RejectionKind::SchemaAlreadyClaimed,
            Self::Io(_) => RejectionKind::Io,
        }
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors from the delivery collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach or log into the remote end.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Remote end answered with an unexpected reply.
    #[error("Unexpected reply to {command}: {code} {message}")]
    Protocol {
        command: String,
        code: u16,
        message: String,
    },

    /// Remote end did not answer in time.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Called before a successful connect.
    #[error("Not connected")]
    NotConnected,

    /// IO error.
    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Migration Errors (top-level)
// =============================================================================

/// Top-level errors of a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single file could not be read or transformed (inspection).
    #[error("File error: {0}")]
    File(#[from] FileError),

    /// Delivery error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Some outputs were not delivered.
    #[error("Upload failed for {}", failed.join(", "))]
    Delivery { failed: Vec<String> },

    /// Report serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error outside of a single file's processing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for per-file processing.
pub type FileResult<T> = Result<T, FileError>;

/// Result type for delivery.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for a migration run.
pub type MigrationResult<T> = Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let config_err = ConfigError::InvalidReplacement("empty token".into());
        let migration_err: MigrationError = config_err.into();
        assert!(migration_err.to_string().contains("empty token"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let file_err: FileError = io.into();
        assert_eq!(file_err.kind(), RejectionKind::Io);

        let migration_err: MigrationError = file_err.into();
        assert!(matches!(migration_err, MigrationError::File(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let migration_err: MigrationError = json_err.into();
        assert!(migration_err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_delivery_error_names_failed_files() {
        let err = MigrationError::Delivery {
            failed: vec!["CPQMIGPN.csv".into(), "CPQMIGCL.csv".into()],
        };
        assert_eq!(err.to_string(), "Upload failed for CPQMIGPN.csv, CPQMIGCL.csv");
    }

    #[test]
    fn test_rejection_kinds_are_specific() {
        let err = FileError::InsufficientColumns {
            schema: "CPQMIGPN".into(),
            required: 96,
            found: 90,
        };
        assert_eq!(err.kind(), RejectionKind::InsufficientColumns);
        let msg = err.to_string();
        assert!(msg.contains("96"));
        assert!(msg.contains("90"));

        let err = FileError::SchemaNotFound { file: "x.csv".into() };
        assert_eq!(err.kind(), RejectionKind::SchemaNotFound);
        assert_eq!(err.kind().to_string(), "schema not found");
    }

    #[test]
    fn test_layout_error_lists_all_violations() {
        let err = ConfigError::Layout {
            path: "schemas.json".into(),
            errors: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains("a; b"));
    }
}
