//! Input discovery and output directory handling.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::summary::{ProcessedFile, Rejection};
use crate::error::FileError;
use crate::logs::{log_info_indent, log_warning};
use crate::models::{display_name, SourceKind};

/// Files found in an input directory.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Readable files with their content, sorted by name
    pub files: Vec<(PathBuf, Vec<u8>)>,
    /// Files that could not be read
    pub unreadable: Vec<Rejection>,
}

impl Discovered {
    pub fn from_files(files: Vec<(PathBuf, Vec<u8>)>) -> Self {
        Self {
            files,
            unreadable: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Paths of `kind` files directly inside `dir`, sorted by name.
///
/// Office lock files (`~$name.xlsx`) and hidden files are skipped. A missing
/// directory yields no files.
pub fn list_inputs(dir: &Path, kind: SourceKind) -> io::Result<Vec<PathBuf>> {
    list_files(dir, kind.extension())
}

/// Read every input of `kind` in `dir`.
pub fn discover(dir: &Path, kind: SourceKind) -> io::Result<Discovered> {
    let mut discovered = Discovered::default();
    for path in list_inputs(dir, kind)? {
        match fs::read(&path) {
            Ok(bytes) => discovered.files.push((path, bytes)),
            Err(e) => {
                let error = FileError::from(e);
                discovered.unreadable.push(Rejection::new(path, &error));
            }
        }
    }
    Ok(discovered)
}

fn list_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        log_warning(format!("Directory {} does not exist", dir.display()));
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = display_name(&path);
        if name.starts_with("~$") || name.starts_with('.') {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Remove the output files of a previous run. Creates the directory if needed.
pub fn clean_output_dir(dir: &Path) -> io::Result<usize> {
    fs::create_dir_all(dir)?;
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write each result as `<SCHEMA>.csv`. Returns the written paths.
pub fn write_outputs(dir: &Path, processed: &[ProcessedFile]) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(processed.len());
    for file in processed {
        let path = dir.join(file.output_name());
        fs::write(&path, file.result.content.as_bytes())?;
        log_info_indent(format!("💾 {}", path.display()), 1);
        written.push(path);
    }
    Ok(written)
}

/// Output files ready for delivery, sorted by name.
pub fn list_outputs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    list_files(dir, "csv")
}

/// Delete the sources of processed files. Rejected files are never passed in.
pub fn remove_inputs(processed: &[ProcessedFile]) -> io::Result<usize> {
    let mut removed = 0;
    for file in processed {
        if file.source.exists() {
            fs::remove_file(&file.source)?;
            log_info_indent(format!("🗑️  {}", display_name(&file.source)), 1);
            removed += 1;
        }
    }
    Ok(removed)
}
