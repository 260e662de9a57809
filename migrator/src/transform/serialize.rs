//! Output serialization.
//!
//! Records are written with the `csv` crate: a field holding the delimiter,
//! a quote or a line break is quoted, so row structure survives any value.
//! The written content is then read back and every record's field count is
//! checked.

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::error::{FileError, FileResult};

/// Serialize the header and rows with `delimiter`, `\n` terminated.
pub fn write_records(delimiter: u8, header: &[String], rows: &[Vec<String>]) -> FileResult<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(header).map_err(std::io::Error::from)?;
    for row in rows {
        writer.write_record(row).map_err(std::io::Error::from)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FileError::Encoding(e.to_string()))
}

/// Check that `content` holds `expected_records` records of `expected`
/// fields each. Rows are numbered from 1, the header being row 1.
pub fn verify_field_counts(
    content: &str,
    delimiter: u8,
    expected: usize,
    expected_records: usize,
) -> FileResult<()> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut seen = 0;
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FileError::Parse(e.to_string()))?;
        if record.len() != expected {
            return Err(FileError::FieldCountMismatch {
                row: idx + 1,
                expected,
                found: record.len(),
            });
        }
        seen += 1;
    }

    if seen != expected_records {
        return Err(FileError::Parse(format!(
            "serialized {} records, expected {}",
            seen, expected_records
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_write_plain_records() {
        let content = write_records(
            b'|',
            &strings(&["A", "B"]),
            &[strings(&["1", "x"]), strings(&["2", ""])],
        )
        .unwrap();
        assert_eq!(content, "A|B\n1|x\n2|\n");
        verify_field_counts(&content, b'|', 2, 3).unwrap();
    }

    #[test]
    fn test_delimiter_inside_value_is_quoted() {
        let content = write_records(b'|', &strings(&["A", "B"]), &[strings(&["a|b", "c"])]).unwrap();
        assert_eq!(content, "A|B\n\"a|b\"|c\n");
        verify_field_counts(&content, b'|', 2, 2).unwrap();
    }

    #[test]
    fn test_line_break_inside_value_keeps_record_count() {
        let content = write_records(b';', &strings(&["A"]), &[strings(&["two\nlines"])]).unwrap();
        verify_field_counts(&content, b';', 1, 2).unwrap();
    }

    #[test]
    fn test_field_count_mismatch_detected() {
        let err = verify_field_counts("A|B\n1|2|3\n", b'|', 2, 2).unwrap_err();
        assert!(matches!(
            err,
            FileError::FieldCountMismatch {
                row: 2,
                expected: 2,
                found: 3
            }
        ));
    }
}
