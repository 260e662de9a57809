//! Input reading: type sniffing, encoding detection and parsing into typed rows.
//!
//! No schema logic here. The result is a [`CandidateFile`] whose rows are
//! exactly what the source holds.

pub mod encoding;
pub mod spreadsheet;

use std::path::Path;

use crate::error::{FileError, FileResult};
use crate::models::{CandidateFile, Cell, RawTable, SourceKind};

pub use encoding::{decode, decode_with, find_corruption, guess_encoding, Decoded};
pub use spreadsheet::{is_workbook, read_first_sheet};

/// Delimiter of delimited-text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDelimiter {
    /// Always this byte
    Fixed(u8),
    /// Sniff from the first line
    Auto,
}

impl InputDelimiter {
    /// Parse a setting value: `auto`, `tab`/`\t`, or a single ASCII character
    /// other than the quote and line breaks.
    pub fn from_setting(value: &str) -> Option<Self> {
        match value {
            "auto" | "AUTO" => Some(Self::Auto),
            "tab" | "\\t" | "\t" => Some(Self::Fixed(b'\t')),
            v if v.len() == 1 && v.is_ascii() && !matches!(v, "\"" | "\n" | "\r") => {
                Some(Self::Fixed(v.as_bytes()[0]))
            }
            _ => None,
        }
    }

    fn resolve(&self, text: &str) -> u8 {
        match self {
            Self::Fixed(b) => *b,
            Self::Auto => detect_delimiter(text) as u8,
        }
    }
}

impl Default for InputDelimiter {
    fn default() -> Self {
        Self::Fixed(b';')
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text into rows of text cells.
///
/// Quoted fields are honoured; records may have different widths.
pub fn parse_delimited(text: &str, delimiter: u8) -> FileResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FileError::Parse(format!("line {}: {}", idx + 1, e)))?;
        rows.push(record.iter().map(Cell::text).collect());
    }
    Ok(rows)
}

/// Read one discovered file according to the batch's processing mode.
pub fn read_candidate(
    path: &Path,
    bytes: &[u8],
    kind: SourceKind,
    delimiter: InputDelimiter,
) -> FileResult<CandidateFile> {
    if bytes.is_empty() {
        return Err(FileError::EmptyFile);
    }

    let (encoding, rows) = match kind {
        SourceKind::Xlsx => {
            if !is_workbook(bytes) {
                return Err(FileError::UnsupportedFormat(
                    "expected an .xlsx workbook, found plain content".to_string(),
                ));
            }
            let rows = read_first_sheet(bytes)?;
            check_cells(&rows)?;
            ("xlsx".to_string(), rows)
        }
        SourceKind::Csv => {
            if is_workbook(bytes) {
                return Err(FileError::UnsupportedFormat(
                    "workbook content found in delimited-text mode".to_string(),
                ));
            }
            let decoded = decode(bytes)?;
            let delimiter = delimiter.resolve(&decoded.text);
            (decoded.encoding.to_string(), parse_delimited(&decoded.text, delimiter)?)
        }
    };

    if rows.iter().all(|row| row.iter().all(Cell::is_empty)) {
        return Err(FileError::EmptyFile);
    }

    Ok(CandidateFile::new(path, encoding, rows))
}

/// Workbook text is already Unicode, but may carry mojibake typed by users
/// or produced upstream.
fn check_cells(rows: &RawTable) -> FileResult<()> {
    for (r, row) in rows.iter().enumerate() {
        for cell in row {
            if let Cell::Text(text) = cell {
                if let Some(marker) = find_corruption(text) {
                    return Err(FileError::Encoding(format!(
                        "corrupted text ('{}') in row {}, file must be regenerated",
                        marker,
                        r + 1
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_input_delimiter_setting() {
        assert_eq!(InputDelimiter::from_setting("auto"), Some(InputDelimiter::Auto));
        assert_eq!(InputDelimiter::from_setting("|"), Some(InputDelimiter::Fixed(b'|')));
        assert_eq!(InputDelimiter::from_setting("tab"), Some(InputDelimiter::Fixed(b'\t')));
        assert_eq!(InputDelimiter::from_setting(";;"), None);
        assert_eq!(InputDelimiter::from_setting("\""), None);
        assert_eq!(InputDelimiter::from_setting("\n"), None);
        assert_eq!(InputDelimiter::from_setting("\r"), None);
    }

    #[test]
    fn test_parse_delimited_keeps_quotes_and_widths() {
        let rows = parse_delimited("A;B;C\n\"x;y\";2\n", b';').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1][0], Cell::Text("x;y".into()));
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_read_candidate_csv() {
        let file = read_candidate(
            Path::new("CPQMIGCL.csv"),
            "CODIGO|NOMBRE\n1|Peña\n".as_bytes(),
            SourceKind::Csv,
            InputDelimiter::Auto,
        )
        .unwrap();
        assert_eq!(file.encoding, "UTF-8");
        assert_eq!(file.rows.len(), 2);
        assert_eq!(file.rows[1][1], Cell::Text("Peña".into()));
    }

    #[test]
    fn test_read_candidate_rejects_wrong_mode() {
        let err = read_candidate(Path::new("a.xlsx"), b"A;B\n", SourceKind::Xlsx, InputDelimiter::default())
            .unwrap_err();
        assert!(matches!(err, FileError::UnsupportedFormat(_)));

        let err = read_candidate(Path::new("a.csv"), b"PK\x03\x04..", SourceKind::Csv, InputDelimiter::default())
            .unwrap_err();
        assert!(matches!(err, FileError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_read_candidate_empty() {
        let err = read_candidate(Path::new("a.csv"), b"", SourceKind::Csv, InputDelimiter::default())
            .unwrap_err();
        assert!(matches!(err, FileError::EmptyFile));

        let err = read_candidate(Path::new("a.csv"), b";;\n", SourceKind::Csv, InputDelimiter::default())
            .unwrap_err();
        assert!(matches!(err, FileError::EmptyFile));
    }

    #[test]
    fn test_check_cells_flags_mojibake() {
        let rows = vec![vec![Cell::text("DescripciÃ³n")]];
        assert!(matches!(check_cells(&rows), Err(FileError::Encoding(_))));
    }
}
