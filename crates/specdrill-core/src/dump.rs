//! Executed-case dump to JSONL files
//!
//! Writes every result (not just failures) to per-operation JSONL files
//! for post-hoc analysis and diffing between runs.
//!
//! ```text
//! .specdrill/dumps/
//! ├── GET__widgets.jsonl
//! ├── POST__widgets__id_.jsonl
//! └── index.json
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::TestResult;

/// Headers that should be masked in dumps.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

const MASK: &str = "***";

/// Summary of a dump, written as `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpIndex {
    pub total: u64,
    pub operations: Vec<DumpOperationEntry>,
    pub dump_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpOperationEntry {
    /// Case name, e.g. "POST /widgets"
    pub operation: String,
    pub file: String,
    pub count: u64,
    pub passed: u64,
}

/// Write results to per-operation JSONL files plus `index.json`.
///
/// # Errors
///
/// Returns error if the directory cannot be created or files cannot be written.
pub fn write_dump(
    results: &[TestResult],
    dump_dir: &Path,
    mask_headers: bool,
) -> Result<DumpIndex, DumpError> {
    std::fs::create_dir_all(dump_dir)
        .map_err(|e| DumpError::Io(format!("create {}: {e}", dump_dir.display())))?;

    // Sorted by case name for deterministic output
    let mut groups: BTreeMap<&str, Vec<&TestResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry(result.test_case.name.as_str())
            .or_default()
            .push(result);
    }

    let mut entries = Vec::new();
    let mut total: u64 = 0;

    let mut used = BTreeSet::new();
    for (operation, group) in groups {
        let filename = unique_filename(&sanitize_filename(operation), &mut used);
        let filepath = dump_dir.join(&filename);

        let file = std::fs::File::create(&filepath)
            .map_err(|e| DumpError::Io(format!("create {}: {e}", filepath.display())))?;
        let mut writer = std::io::BufWriter::new(file);

        let count = group.len() as u64;
        let passed = group.iter().filter(|r| r.success).count() as u64;
        total += count;

        for result in group {
            let line = if mask_headers {
                serde_json::to_string(&mask_result(result))
            } else {
                serde_json::to_string(result)
            }
            .map_err(|e| DumpError::Serialize(e.to_string()))?;
            writeln!(writer, "{line}")
                .map_err(|e| DumpError::Io(format!("write {}: {e}", filepath.display())))?;
        }

        writer
            .flush()
            .map_err(|e| DumpError::Io(format!("flush {}: {e}", filepath.display())))?;

        entries.push(DumpOperationEntry {
            operation: operation.to_string(),
            file: filename,
            count,
            passed,
        });
    }

    let index = DumpIndex {
        total,
        operations: entries,
        dump_dir: dump_dir.to_path_buf(),
    };

    let index_path = dump_dir.join("index.json");
    let index_json =
        serde_json::to_string_pretty(&index).map_err(|e| DumpError::Serialize(e.to_string()))?;
    std::fs::write(&index_path, index_json)
        .map_err(|e| DumpError::Io(format!("write {}: {e}", index_path.display())))?;

    Ok(index)
}

/// Prevents PATH_MAX issues on long path templates.
const MAX_FILENAME_LEN: usize = 200;

/// Distinct case names can sanitize to the same file; later ones get a
/// numeric suffix so no group overwrites another.
fn unique_filename(candidate: &str, used: &mut BTreeSet<String>) -> String {
    let stem = candidate.strip_suffix(".jsonl").unwrap_or(candidate);
    let mut filename = candidate.to_string();
    let mut n = 2;
    while !used.insert(filename.clone()) {
        filename = format!("{stem}-{n}.jsonl");
        n += 1;
    }
    filename
}

/// "POST /widgets/{id}" → "POST__widgets__id_.jsonl"
fn sanitize_filename(operation: &str) -> String {
    let sanitized: String = operation
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' => c,
            _ => '_',
        })
        .collect();
    format!("{sanitized}.jsonl")
}

fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|&h| name.eq_ignore_ascii_case(h))
}

fn mask_result(result: &TestResult) -> TestResult {
    let mut masked = result.clone();
    for (key, value) in &mut masked.request.headers {
        if is_sensitive_header(key) {
            *value = MASK.to_string();
        }
    }
    masked
}

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
}
