//! Ledger file discovery and loading.
//!
//! Reads transaction records from `.json` files (one array of objects) and
//! `.jsonl` files (one object per line), or from a directory tree of both.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use pyramid_core::error::{PyramidError, Result};
use serde_json::Value;
use tracing::{debug, warn};

const LEDGER_EXTENSIONS: &[&str] = &["json", "jsonl"];

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` / `.jsonl` files recursively under `dir`, sorted by path.
pub fn find_ledger_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_ledger_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every ledger record found at `path`.
///
/// `path` may be a single file or a directory. Records from several files are
/// concatenated in path order.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let metadata = std::fs::metadata(path).map_err(|source| PyramidError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return load_file(path);
    }

    let files = find_ledger_files(path);
    if files.is_empty() {
        warn!("No ledger files found in {}", path.display());
    }

    let mut records = Vec::new();
    for file in &files {
        records.extend(load_file(file)?);
    }

    debug!("Loaded {} records from {} files", records.len(), files.len());
    Ok(records)
}

/// Load one ledger file, choosing the parser from its extension.
///
/// Files with any extension other than `.jsonl` are read as a JSON array.
pub fn load_file(path: &Path) -> Result<Vec<Value>> {
    let file = std::fs::File::open(path).map_err(|source| PyramidError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);

    let is_jsonl = path.extension().is_some_and(|ext| ext == "jsonl");
    if is_jsonl {
        parse_jsonl(reader, path)
    } else {
        parse_json_array(reader)
    }
}

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse JSON Lines, skipping blank lines and lines that fail to parse.
pub fn parse_jsonl<R: BufRead>(reader: R, source: &Path) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => records.push(value),
            Err(e) => warn!(
                "Skipping malformed line {} in {}: {}",
                line_no + 1,
                source.display(),
                e
            ),
        }
    }
    Ok(records)
}

/// Parse a document that is either an array of records or a single record.
pub fn parse_json_array<R: std::io::Read>(reader: R) -> Result<Vec<Value>> {
    match serde_json::from_reader::<_, Value>(reader)? {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => Ok(vec![Value::Object(obj)]),
        other => Err(PyramidError::Data(format!(
            "expected an array of records, found {}",
            json_type_name(&other)
        ))),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn is_ledger_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LEDGER_EXTENSIONS.contains(&ext))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
