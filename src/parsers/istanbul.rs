/// Parser for the istanbul / vitest `coverage-final.json` document.
///
/// Reference: https://github.com/istanbuljs/istanbuljs
///
/// The format is a JSON object keyed by file path. Only the statement data
/// is read here:
///   - `statementMap`: `{ "0": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 30 } }, ... }`
///   - `s`:            `{ "0": 5, "1": 0, ... }`, hit counts per statement
///   - `all`:          `true` when the file was never loaded by any test
use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::Parser;
use crate::error::{CovreportError, Result};
use crate::model::{Position, Span, StatementCoverage};

/// Statement coverage for every file of one coverage-final document.
pub type StatementReport = BTreeMap<String, StatementCoverage>;

/// Istanbul / NYC JSON parser.
pub struct IstanbulParser;

impl IstanbulParser {
    /// Cheap check on file name and leading content.
    pub fn can_parse(&self, path: &Path, content: &[u8]) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.to_lowercase() == "coverage-final.json" {
                return true;
            }
        }
        looks_like_istanbul(&super::sniff_head(content))
    }
}

impl Parser for IstanbulParser {
    type Output = StatementReport;

    fn parse(&self, input: &[u8]) -> Result<StatementReport> {
        parse(input)
    }
}

/// Parse Istanbul JSON from raw bytes.
pub fn parse(input: &[u8]) -> Result<StatementReport> {
    if input.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(StatementReport::new());
    }

    let root: Value = serde_json::from_slice(input)?;
    let entries = root.as_object().ok_or_else(|| {
        CovreportError::Parse("coverage-final document is not a JSON object".to_string())
    })?;

    let mut report = StatementReport::new();
    for (file_path, entry) in entries {
        report.insert(file_path.clone(), parse_file_entry(file_path, entry));
    }
    Ok(report)
}

/// A JSON object whose values carry `"statementMap"` and `"s"`.
fn looks_like_istanbul(head: &str) -> bool {
    let trimmed = head.trim();
    if !trimmed.starts_with('{') {
        return false;
    }
    trimmed.contains("\"statementMap\"") && trimmed.contains("\"s\"")
}

/// Parse a single file entry from the Istanbul JSON.
fn parse_file_entry(file_path: &str, entry: &Value) -> StatementCoverage {
    // Prefer the embedded `path`; the key and the path normally agree.
    let path = entry
        .get("path")
        .and_then(|p| p.as_str())
        .unwrap_or(file_path)
        .to_string();

    let mut file = StatementCoverage::new(path);
    parse_statements(entry, &mut file);
    file
}

/// Copy `statementMap` + `s` into the model.
///
/// Statements whose location has no `start.line` are skipped. A missing end
/// line falls back to the start line.
fn parse_statements(entry: &Value, file: &mut StatementCoverage) {
    let stmt_map = match entry.get("statementMap").and_then(|v| v.as_object()) {
        Some(m) => m,
        None => return,
    };
    let s = entry.get("s").and_then(|v| v.as_object());

    for (idx, loc) in stmt_map {
        let start = match position(loc.get("start")) {
            Some(p) => p,
            None => continue,
        };
        let end = position(loc.get("end")).unwrap_or(start);

        let count = s
            .and_then(|s| s.get(idx.as_str()))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        file.insert(idx.clone(), Span { start, end }, count);
    }
}

fn position(value: Option<&Value>) -> Option<Position> {
    let value = value?;
    let line = u32::try_from(value.get("line")?.as_u64()?).ok()?;
    let column = value
        .get("column")
        .and_then(|c| c.as_u64())
        .and_then(|c| u32::try_from(c).ok());
    Some(Position { line, column })
}
