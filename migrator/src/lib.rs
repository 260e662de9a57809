//! # cpqmig - CPQ data migration to the mainframe
//!
//! Turns spreadsheet and delimited-text exports into the fixed column
//! layouts the mainframe ingests, then delivers them over FTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌────────────┐
//! │ xlsx / csv │───▶│   Parser   │───▶│  Matcher   │───▶│ Transform  │───▶│ <SCHEMA>   │──▶ FTP
//! │   files    │    │ (encoding) │    │ (registry) │    │ (rows/cols)│    │   .csv     │
//! └────────────┘    └────────────┘    └────────────┘    └────────────┘    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cpqmig::{discover, Migrator, OutputOptions, ReplacementTable, SchemaRegistry, SourceKind};
//!
//! let registry = SchemaRegistry::load("config/schemas.json")?;
//! let replacements = ReplacementTable::load("config/replacements.json")?;
//! let migrator = Migrator::new(
//!     &registry,
//!     &replacements,
//!     OutputOptions::default(),
//!     SourceKind::Xlsx,
//!     Default::default(),
//! );
//! let summary = migrator.run_batch(discover("input_xlsx".as_ref(), SourceKind::Xlsx)?);
//! summary.log_report();
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, candidate files, transform results
//! - [`parser`] - Type sniffing, encoding detection, xlsx/csv reading
//! - [`schema`] - Schema registry and matcher
//! - [`replace`] - Special-character replacement table
//! - [`transform`] - Row/column transformation and serialization
//! - [`orchestrator`] - Batch processing, outputs, delivery
//! - [`transport`] - FTP and other destinations
//! - [`config`] - Settings from the environment
//! - [`validation`] - JSON Schema checks of configuration documents
//! - [`logs`] - Run log

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Configuration
pub mod config;
pub mod replace;
pub mod schema;
pub mod validation;

// Pipeline
pub mod orchestrator;
pub mod parser;
pub mod transform;

// Delivery
pub mod transport;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, FileError, FileResult, MigrationError, MigrationResult,
    RejectionKind, TransportError, TransportResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CandidateFile, Cell, Diagnostics, RawTable, SourceKind, TransformResult};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{AppConfig, Destination, FtpConfig};
pub use replace::ReplacementTable;
pub use schema::{MatchOutcome, SchemaDefinition, SchemaMatcher, SchemaRegistry, SchemaSpec};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use orchestrator::{
    clean_output_dir, discover, list_outputs, remove_inputs, write_outputs, BatchSummary,
    Delivery, DeliveryReport, Discovered, Migrator, ProcessedFile, Rejection,
};
pub use parser::{read_candidate, InputDelimiter};
pub use transform::{OutputOptions, Transformer};

// =============================================================================
// Re-exports - Delivery
// =============================================================================

pub use transport::{DirectoryTransport, DryRunTransport, FtpTransport, Transport};
