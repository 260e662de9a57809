//! Transformation module.
//!
//! Applies a resolved schema to a candidate file:
//! - Rows: skip rows, header extraction, column assignment
//! - Values: date serials and numeric cleanup
//! - Serialize: delimited output and its field-count check
//! - Pipeline: the [`Transformer`] chaining the steps

pub mod pipeline;
pub mod rows;
pub mod serialize;
pub mod values;

pub use pipeline::{OutputOptions, Transformer};
pub use values::{date_to_serial, format_number, render_date, serial_to_date};
