//! Compare the current coverage snapshot against an optional baseline and
//! classify every file by whether it changed.
//!
//! The change-set is expressed relative to the workspace root while snapshot
//! keys may be absolute, so every lookup goes through [`relative_path`].

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use crate::icons;
use crate::model::{Category, CoverageReport, CoverageSnapshot};

/// How a file relates to the proposed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// The file is part of the change-set.
    Changed,
    /// Not changed, but at least one category percentage moved against the baseline.
    Affected,
    /// Not changed and no percentage moved (or nothing to compare against).
    Unaffected,
    /// No baseline snapshot was supplied, so nothing was compared.
    Unchanged,
}

/// Comparison result for a single file of the current snapshot.
#[derive(Debug, Clone)]
pub struct FileComparison {
    /// Key as it appears in the current snapshot.
    pub key: String,
    /// Workspace-relative form of `key`.
    pub path: String,
    pub classification: Classification,
    pub current: CoverageReport,
    pub baseline: Option<CoverageReport>,
}

impl FileComparison {
    /// `current.pct - baseline.pct` for one category, if a baseline entry exists.
    #[must_use]
    pub fn delta(&self, category: Category) -> Option<f64> {
        self.baseline
            .as_ref()
            .map(|b| percent_delta(self.current.get(category).pct, b.get(category).pct))
    }
}

/// All files of the current snapshot, each classified exactly once.
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    pub has_baseline: bool,
    pub files: Vec<FileComparison>,
}

impl Comparison {
    /// Files with the given classification, in snapshot order.
    pub fn with(&self, classification: Classification) -> impl Iterator<Item = &FileComparison> {
        self.files
            .iter()
            .filter(move |f| f.classification == classification)
    }

    #[must_use]
    pub fn count(&self, classification: Classification) -> usize {
        self.with(classification).count()
    }
}

/// Signed percentage change; positive is an increase.
#[must_use]
pub fn percent_delta(current: f64, baseline: f64) -> f64 {
    current - baseline
}

/// Format a percentage delta with an indicator glyph.
///
/// Zero renders as `±0%`; anything else is printed with `decimal_places`
/// decimals and an explicit sign.
#[must_use]
pub fn format_delta(delta: f64, decimal_places: usize) -> String {
    if delta == 0.0 {
        return format!("{} <em>±0%</em>", icons::EQUAL);
    }
    if delta > 0.0 {
        return format!(
            "{} <em>+{:.*}%</em>",
            icons::INCREASE,
            decimal_places,
            delta
        );
    }
    // The sign is already part of the formatted number.
    format!("{} <em>{:.*}%</em>", icons::DECREASE, decimal_places, delta)
}

/// Classify every file of `current`.
///
/// Rules, first match wins:
///   1. path is in `changes` → `Changed`
///   2. no baseline at all → `Unchanged`
///   3. baseline has no entry for the path → `Unaffected`
///   4. any category percentage differs → `Affected`, else `Unaffected`
pub fn compare(
    current: &CoverageSnapshot,
    baseline: Option<&CoverageSnapshot>,
    changes: &[String],
    workspace_root: &Path,
) -> Comparison {
    let changed: HashSet<String> = changes
        .iter()
        .map(|p| relative_path(workspace_root, p))
        .collect();

    let baseline_index: Option<HashMap<String, &CoverageReport>> = baseline.map(|b| {
        b.files
            .iter()
            .map(|(key, report)| (relative_path(workspace_root, key), report))
            .collect()
    });

    let files = current
        .files
        .iter()
        .map(|(key, report)| {
            let path = relative_path(workspace_root, key);
            let previous = baseline_index
                .as_ref()
                .and_then(|index| index.get(&path))
                .map(|r| **r);
            let classification =
                classify(&path, report, previous.as_ref(), &changed, baseline.is_some());
            FileComparison {
                key: key.clone(),
                path,
                classification,
                current: *report,
                baseline: previous,
            }
        })
        .collect();

    Comparison {
        has_baseline: baseline.is_some(),
        files,
    }
}

fn classify(
    path: &str,
    current: &CoverageReport,
    previous: Option<&CoverageReport>,
    changed: &HashSet<String>,
    has_baseline: bool,
) -> Classification {
    if changed.contains(path) {
        return Classification::Changed;
    }
    if !has_baseline {
        return Classification::Unchanged;
    }
    let previous = match previous {
        Some(p) => p,
        None => return Classification::Unaffected,
    };

    let moved = Category::ALL
        .iter()
        .any(|&c| percent_delta(current.get(c).pct, previous.get(c).pct) != 0.0);
    if moved {
        Classification::Affected
    } else {
        Classification::Unaffected
    }
}

/// Express `path` relative to `root`, using `/` as separator.
///
/// Relative paths are taken to be relative to `root` already and are only
/// normalized (`./` and empty components dropped). Absolute paths outside
/// `root` get `..` components. An absolute path under a relative root is
/// returned unchanged, since the two cannot be related without the process
/// working directory.
#[must_use]
pub fn relative_path(root: &Path, path: &str) -> String {
    let target = Path::new(path);
    if !target.is_absolute() {
        return join(normal_components(target));
    }
    if !root.is_absolute() {
        return path.to_string();
    }

    let root_parts = normal_components(root);
    let target_parts = normal_components(target);
    let common = root_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); root_parts.len() - common];
    parts.extend(target_parts[common..].iter().cloned());
    join(parts)
}

fn normal_components(path: &Path) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts
}

fn join(parts: Vec<String>) -> String {
    parts.join("/")
}
