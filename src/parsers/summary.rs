/// Parser for the istanbul / vitest `coverage-summary.json` document.
///
/// The document is a JSON object with a `"total"` key plus one key per
/// covered file. Every value has the four categories `lines`, `statements`,
/// `functions` and `branches`, each `{ total, covered, skipped, pct }`.
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::Parser;
use crate::error::{CovreportError, Result};
use crate::model::{CoverageReport, CoverageSnapshot, TOTAL_KEY};

/// json-summary parser.
pub struct SummaryParser;

impl Parser for SummaryParser {
    type Output = CoverageSnapshot;

    fn parse(&self, input: &[u8]) -> Result<CoverageSnapshot> {
        parse(input)
    }
}

/// Parse a json-summary document from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageSnapshot> {
    if super::sniff_head(input).trim().is_empty() {
        return Err(CovreportError::Parse(
            "json-summary document is empty".to_string(),
        ));
    }

    let mut entries: BTreeMap<String, CoverageReport> = serde_json::from_slice(input)?;
    let total = entries.remove(TOTAL_KEY).ok_or_else(|| {
        CovreportError::Parse(format!(
            "json-summary document has no \"{TOTAL_KEY}\" entry"
        ))
    })?;

    Ok(CoverageSnapshot {
        total,
        files: entries,
    })
}

/// Accept `pct` as a number, a numeric string, or istanbul's `"Unknown"`
/// (emitted for categories with nothing to cover), which reads as 100.
pub fn lenient_pct<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("pct is not a finite number")),
        Value::String(s) => Ok(s.trim().parse::<f64>().unwrap_or(100.0)),
        Value::Null => Ok(100.0),
        other => Err(serde::de::Error::custom(format!(
            "expected a number for pct, got {other}"
        ))),
    }
}
