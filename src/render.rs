//! Compose the coverage tables posted as the report body.
//!
//! The output is HTML table markup embedded in markdown, the shape GitHub
//! renders in comments and job summaries. Tables are written on a single
//! line so that markdown never breaks them apart.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;

use crate::compare::{format_delta, percent_delta, Classification, Comparison, FileComparison};
use crate::error::CovreportError;
use crate::icons;
use crate::model::{Category, CoverageReport, StatementCoverage};
use crate::parsers::istanbul::StatementReport;
use crate::ranges::{format_ranges, format_ranges_linked, uncovered_ranges};
use crate::threshold::ThresholdConfig;

/// Literal shown instead of the file table when no changed file has coverage.
pub const NO_CHANGED_FILES: &str = "No changed files found.";

/// Which file groups the per-file table contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileCoverageMode {
    /// No per-file table at all.
    None,
    /// Changed files only.
    #[default]
    Changes,
    /// Changed files plus files whose coverage moved against the baseline.
    Affected,
    /// Every file.
    All,
}

impl FileCoverageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCoverageMode::None => "none",
            FileCoverageMode::Changes => "changes",
            FileCoverageMode::Affected => "affected",
            FileCoverageMode::All => "all",
        }
    }

    /// Parse user input, falling back to `changes` with a warning.
    pub fn from_input(input: &str) -> Self {
        input.parse().unwrap_or_else(|_| {
            warn!("Not a valid value \"{input}\" for file coverage mode, using \"changes\"");
            FileCoverageMode::Changes
        })
    }

    fn shows(&self, group: Group) -> bool {
        match (self, group) {
            (FileCoverageMode::None, _) => false,
            (_, Group::Changed) => true,
            (FileCoverageMode::Changes, _) => false,
            (FileCoverageMode::Affected, Group::Affected) => true,
            (FileCoverageMode::Affected, Group::Rest) => false,
            (FileCoverageMode::All, _) => true,
        }
    }
}

impl FromStr for FileCoverageMode {
    type Err = CovreportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(FileCoverageMode::None),
            "changes" => Ok(FileCoverageMode::Changes),
            "affected" => Ok(FileCoverageMode::Affected),
            "all" => Ok(FileCoverageMode::All),
            _ => Err(CovreportError::Parse(format!(
                "Unknown file coverage mode: '{s}'. Supported: all, affected, changes, none"
            ))),
        }
    }
}

impl fmt::Display for FileCoverageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URLs into the hosting platform for one repository at one commit.
#[derive(Debug, Clone)]
pub struct RepoLinks {
    pub server_url: String,
    pub repository: String,
    pub sha: String,
}

impl RepoLinks {
    #[must_use]
    pub fn blob_url(&self, relative_path: &str) -> String {
        format!(
            "{}/{}/blob/{}/{}",
            self.server_url.trim_end_matches('/'),
            self.repository,
            self.sha,
            relative_path
        )
    }

    #[must_use]
    pub fn run_url(&self, run_id: u64) -> String {
        format!(
            "{}/{}/actions/runs/{run_id}",
            self.server_url.trim_end_matches('/'),
            self.repository,
        )
    }

    #[must_use]
    pub fn commit_url(&self) -> String {
        format!(
            "{}/{}/commit/{}",
            self.server_url.trim_end_matches('/'),
            self.repository,
            self.sha
        )
    }
}

/// The CI run that produced the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub number: u64,
}

/// Presentation settings, resolved once from the options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub name: Option<String>,
    /// Working directory as the user gave it, for the headline.
    pub working_directory: String,
    /// Repository root. Change-set entries, table paths and blob links are
    /// relative to it.
    pub repo_root: PathBuf,
    pub mode: FileCoverageMode,
    pub decimal_places: usize,
    pub thresholds: ThresholdConfig,
    pub links: Option<RepoLinks>,
    pub commit_sha: Option<String>,
    pub workflow_run: Option<WorkflowRun>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            name: None,
            working_directory: "./".to_string(),
            repo_root: PathBuf::from("."),
            mode: FileCoverageMode::default(),
            decimal_places: 2,
            thresholds: ThresholdConfig::default(),
            links: None,
            commit_sha: None,
            workflow_run: None,
        }
    }
}

/// Everything the report body is built from.
pub struct ReportInput<'a> {
    pub total: &'a CoverageReport,
    pub baseline_total: Option<&'a CoverageReport>,
    pub comparison: &'a Comparison,
    pub statements: &'a StatementReport,
}

/// Render the full report body: headline, summary table, file table, footer.
#[must_use]
pub fn render_report(input: &ReportInput<'_>, options: &RenderOptions) -> String {
    let mut md = String::new();

    writeln!(
        md,
        "## {}\n",
        headline(options.name.as_deref(), &options.working_directory)
    )
    .unwrap();
    md.push_str(&summary_table(
        input.total,
        input.baseline_total,
        &options.thresholds,
        options.decimal_places,
    ));
    md.push('\n');

    if options.mode != FileCoverageMode::None {
        let files = file_table(input.comparison, input.statements, options);
        writeln!(
            md,
            "\n<details><summary>File Coverage</summary>{files}</details>"
        )
        .unwrap();
    }

    if let Some(footer) = footer(options) {
        writeln!(md, "\n<em>{footer}</em>").unwrap();
    }

    md
}

/// "Generated in workflow #N for commit abc1234 by covreport", with the
/// parts that are known.
fn footer(options: &RenderOptions) -> Option<String> {
    if options.commit_sha.is_none() && options.workflow_run.is_none() {
        return None;
    }

    let mut footer = String::from("Generated");
    if let Some(run) = options.workflow_run {
        let label = format!("#{}", run.number);
        let label = match options.links {
            Some(ref links) => format!("<a href=\"{}\">{label}</a>", links.run_url(run.id)),
            None => label,
        };
        write!(footer, " in workflow {label}").unwrap();
    }
    if let Some(ref sha) = options.commit_sha {
        let short_sha: String = sha.chars().take(7).collect();
        let commit = match options.links {
            Some(ref links) => format!("<a href=\"{}\">{short_sha}</a>", links.commit_url()),
            None => short_sha,
        };
        write!(footer, " for commit {commit}").unwrap();
    }
    footer.push_str(" by covreport");
    Some(footer)
}

/// Headline naming the report and, outside the root, its directory.
#[must_use]
pub fn headline(name: Option<&str>, working_directory: &str) -> String {
    let name = name.filter(|n| !n.is_empty());
    let dir = Some(working_directory).filter(|d| !is_root_dir(d));
    match (name, dir) {
        (Some(name), Some(dir)) => format!("Coverage Report for {name} ({dir})"),
        (Some(name), None) => format!("Coverage Report for {name}"),
        (None, Some(dir)) => format!("Coverage Report for {dir}"),
        (None, None) => "Coverage Report".to_string(),
    }
}

pub(crate) fn is_root_dir(dir: &str) -> bool {
    matches!(dir.trim(), "" | "." | "./")
}

/// One row per category with status, percentage, delta and counts.
#[must_use]
pub fn summary_table(
    total: &CoverageReport,
    baseline_total: Option<&CoverageReport>,
    thresholds: &ThresholdConfig,
    decimal_places: usize,
) -> String {
    let mut html = String::from(
        "<table><thead><tr>\
         <th align=\"center\">Status</th>\
         <th align=\"left\">Category</th>\
         <th align=\"right\">Percentage</th>\
         <th align=\"right\">Covered / Total</th>\
         </tr></thead><tbody>",
    );

    for category in Category::SUMMARY_ORDER {
        let numbers = total.get(category);
        let status = thresholds.evaluate(category, numbers.pct);

        let mut percent = format!("{}%", numbers.pct);
        if let Some(target) = status.target {
            write!(percent, " ({} {target}%)", icons::TARGET).unwrap();
        }
        if let Some(baseline) = baseline_total {
            let delta = percent_delta(numbers.pct, baseline.get(category).pct);
            write!(percent, "<br/>{}", format_delta(delta, decimal_places)).unwrap();
        }

        write!(
            html,
            "<tr><td align=\"center\">{}</td><td align=\"left\">{}</td>\
             <td align=\"right\">{percent}</td>\
             <td align=\"right\">{} / {}</td></tr>",
            status.icon,
            category.label(),
            numbers.covered,
            numbers.total,
        )
        .unwrap();
    }

    html.push_str("</tbody></table>");
    html
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Changed,
    Affected,
    Rest,
}

/// The per-file table, grouped as Changed → Affected → the rest.
///
/// Every file lands in exactly one group. When the mode restricts output to
/// changed (and affected) files and none exist, the empty-state notice is
/// returned instead of a table.
#[must_use]
pub fn file_table(
    comparison: &Comparison,
    statements: &StatementReport,
    options: &RenderOptions,
) -> String {
    let mut changed = Vec::new();
    let mut affected = Vec::new();
    let mut rest = Vec::new();
    for file in &comparison.files {
        match file.classification {
            Classification::Changed => changed.push(file),
            Classification::Affected => affected.push(file),
            Classification::Unaffected | Classification::Unchanged => rest.push(file),
        }
    }

    let rest_label = if comparison.has_baseline {
        "Unaffected Files"
    } else {
        "Unchanged Files"
    };
    let groups = [
        (Group::Changed, "Changed Files", changed, true),
        (Group::Affected, "Affected Files", affected, true),
        (Group::Rest, rest_label, rest, false),
    ];

    let visible: Vec<_> = groups
        .into_iter()
        .filter(|(group, _, files, _)| options.mode.shows(*group) && !files.is_empty())
        .collect();

    if visible.is_empty() && options.mode != FileCoverageMode::All {
        return NO_CHANGED_FILES.to_string();
    }

    let uncovered = UncoveredLookup::new(statements, &options.repo_root);

    let mut html = String::from(
        "<table><thead><tr>\
         <th align=\"left\">File</th>\
         <th align=\"right\">Stmts</th>\
         <th align=\"right\">% Branch</th>\
         <th align=\"right\">% Funcs</th>\
         <th align=\"right\">% Lines</th>\
         <th align=\"left\">Uncovered Lines</th>\
         </tr></thead><tbody>",
    );
    for (_, caption, files, show_comparison) in &visible {
        write!(
            html,
            "<tr><td align=\"left\" colspan=\"6\"><b>{caption}</b></td></tr>"
        )
        .unwrap();
        for file in files {
            html.push_str(&file_row(file, &uncovered, *show_comparison, options));
        }
    }
    html.push_str("</tbody></table>");
    html
}

fn file_row(
    file: &FileComparison,
    uncovered: &UncoveredLookup<'_>,
    show_comparison: bool,
    options: &RenderOptions,
) -> String {
    let url = options.links.as_ref().map(|l| l.blob_url(&file.path));
    let mut row = match url {
        Some(ref url) => format!("<tr><td align=\"left\"><a href=\"{url}\">{}</a></td>", file.path),
        None => format!("<tr><td align=\"left\">{}</td>", file.path),
    };

    for category in Category::ALL {
        let mut cell = format!("{}%", file.current.get(category).pct);
        if show_comparison {
            if let Some(delta) = file.delta(category) {
                write!(cell, "<br/>{}", format_delta(delta, options.decimal_places)).unwrap();
            }
        }
        write!(row, "<td align=\"right\">{cell}</td>").unwrap();
    }

    let ranges = uncovered
        .find(file)
        .map(uncovered_ranges)
        .unwrap_or_default();
    let lines = match url {
        Some(ref url) => format_ranges_linked(&ranges, url),
        None => format_ranges(&ranges),
    };
    write!(row, "<td align=\"left\">{lines}</td></tr>").unwrap();
    row
}

/// Find a file's statement coverage by its summary key, falling back to the
/// workspace-relative path when the two documents disagree on absoluteness.
struct UncoveredLookup<'a> {
    statements: &'a StatementReport,
    by_relative: HashMap<String, &'a StatementCoverage>,
}

impl<'a> UncoveredLookup<'a> {
    fn new(statements: &'a StatementReport, root: &Path) -> Self {
        let by_relative = statements
            .iter()
            .map(|(key, cov)| (crate::compare::relative_path(root, key), cov))
            .collect();
        Self {
            statements,
            by_relative,
        }
    }

    fn find(&self, file: &FileComparison) -> Option<&'a StatementCoverage> {
        self.statements
            .get(&file.key)
            .or_else(|| self.by_relative.get(&file.path).copied())
    }
}
