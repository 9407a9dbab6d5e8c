use std::path::Path;

use log::{debug, warn};

use crate::error::{CovreportError, Result};
use crate::model::CoverageSnapshot;
use crate::parsers::istanbul::{IstanbulParser, StatementReport};
use crate::parsers::summary::SummaryParser;
use crate::parsers::Parser;

/// Read and parse a json-summary document. Any failure is fatal: without the
/// summary there is nothing to report.
pub fn read_summary(path: &Path) -> Result<CoverageSnapshot> {
    let content = std::fs::read(path).map_err(|e| {
        CovreportError::Other(format!(
            "Failed to read the json-summary at \"{}\": {e}. Make sure the test run \
             includes the \"json-summary\" coverage reporter.",
            path.display()
        ))
    })?;
    let snapshot = SummaryParser.parse(&content).map_err(|e| {
        CovreportError::Parse(format!(
            "Failed to parse the json-summary at \"{}\": {e}",
            path.display()
        ))
    })?;
    debug!(
        "Read json-summary {} ({} files)",
        path.display(),
        snapshot.files.len()
    );
    Ok(snapshot)
}

/// Read the baseline summary when one was requested.
pub fn read_baseline(path: Option<&Path>) -> Result<Option<CoverageSnapshot>> {
    path.map(read_summary).transpose()
}

/// Read a coverage-final document. Failures degrade to an empty report
/// with a warning; the uncovered-lines column is then left empty.
pub fn read_statements(path: &Path) -> StatementReport {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "Failed to read coverage-final at \"{}\": {e}. Uncovered lines will be \
                 empty; include the \"json\" coverage reporter to get them.",
                path.display()
            );
            return StatementReport::new();
        }
    };

    let parser = IstanbulParser;
    if !parser.can_parse(path, &content) {
        debug!(
            "{} does not look like a coverage-final document",
            path.display()
        );
    }

    match parser.parse(&content) {
        Ok(report) => report,
        Err(e) => {
            warn!(
                "Failed to parse coverage-final at \"{}\": {e}. Uncovered lines will be empty.",
                path.display()
            );
            StatementReport::new()
        }
    }
}
