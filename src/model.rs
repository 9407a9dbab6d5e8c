//! In-memory representation of the two coverage documents the report is
//! built from: the per-file percentage summary and the per-statement map.
//! Both are read once per run and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Key of the aggregate entry in a json-summary document.
pub const TOTAL_KEY: &str = "total";

/// One of the four fixed coverage metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Statements,
    Branches,
    Functions,
    Lines,
}

impl Category {
    /// Column order of the per-file table.
    pub const ALL: [Category; 4] = [
        Category::Statements,
        Category::Branches,
        Category::Functions,
        Category::Lines,
    ];

    /// Row order of the summary table.
    pub const SUMMARY_ORDER: [Category; 4] = [
        Category::Lines,
        Category::Statements,
        Category::Functions,
        Category::Branches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Statements => "statements",
            Category::Branches => "branches",
            Category::Functions => "functions",
            Category::Lines => "lines",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Statements => "Statements",
            Category::Branches => "Branches",
            Category::Functions => "Functions",
            Category::Lines => "Lines",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts for one metric category. `pct` comes from the upstream tool and is
/// never recomputed from `covered / total`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ReportNumbers {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub covered: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default, deserialize_with = "crate::parsers::summary::lenient_pct")]
    pub pct: f64,
}

impl ReportNumbers {
    pub fn new(covered: u64, total: u64, pct: f64) -> Self {
        Self {
            total,
            covered,
            skipped: 0,
            pct,
        }
    }
}

/// Coverage of either one file or the whole project.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct CoverageReport {
    pub statements: ReportNumbers,
    pub branches: ReportNumbers,
    pub functions: ReportNumbers,
    pub lines: ReportNumbers,
}

impl CoverageReport {
    #[must_use]
    pub fn get(&self, category: Category) -> &ReportNumbers {
        match category {
            Category::Statements => &self.statements,
            Category::Branches => &self.branches,
            Category::Functions => &self.functions,
            Category::Lines => &self.lines,
        }
    }

    /// Build a report where every category carries the same numbers.
    pub fn uniform(numbers: ReportNumbers) -> Self {
        Self {
            statements: numbers,
            branches: numbers,
            functions: numbers,
            lines: numbers,
        }
    }
}

/// A complete json-summary document: the aggregate plus one entry per file.
///
/// File keys are kept exactly as the upstream tool wrote them (absolute or
/// relative); path normalization happens in the comparator.
#[derive(Debug, Clone, Default)]
pub struct CoverageSnapshot {
    pub total: CoverageReport,
    pub files: BTreeMap<String, CoverageReport>,
}

impl CoverageSnapshot {
    pub fn new(total: CoverageReport) -> Self {
        Self {
            total,
            files: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CoverageReport> {
        self.files.get(path)
    }
}

/// A `{ line, column }` position inside a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: Option<u32>,
}

/// Source span of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn lines(start: u32, end: u32) -> Self {
        Self {
            start: Position {
                line: start,
                column: None,
            },
            end: Position {
                line: end,
                column: None,
            },
        }
    }
}

/// Statement-level coverage of one file (one entry of coverage-final.json).
///
/// Statement ids are opaque strings in the document; consumers that depend on
/// source order must sort them numerically, see [`StatementCoverage::ordered`].
#[derive(Debug, Clone, Default)]
pub struct StatementCoverage {
    pub path: String,
    pub statement_map: BTreeMap<String, Span>,
    pub s: BTreeMap<String, u64>,
}

impl StatementCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, span: Span, hits: u64) {
        let id = id.into();
        self.statement_map.insert(id.clone(), span);
        self.s.insert(id, hits);
    }

    /// Statements as `(span, hit_count)` in ascending numeric id order.
    ///
    /// A statement without an entry in `s` counts as never executed. Ids that
    /// are not integers sort after all numeric ids.
    #[must_use]
    pub fn ordered(&self) -> Vec<(Span, u64)> {
        let mut ids: Vec<&String> = self.statement_map.keys().collect();
        ids.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        });
        ids.into_iter()
            .map(|id| (self.statement_map[id], self.s.get(id).copied().unwrap_or(0)))
            .collect()
    }
}

/// Inclusive range of source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}
