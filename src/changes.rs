/// Sources for the change-set: the list of repository-relative file paths
/// touched by the proposed change.
///
/// Provides a [`ChangeSource`] trait that abstracts over the ways to obtain
/// it (a plain list, a unified diff, `git diff`, or the GitHub API).
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use log::warn;

use crate::github::{self, PullRequestApi};

// ---------------------------------------------------------------------------
// Change sources
// ---------------------------------------------------------------------------

/// A source for obtaining the change-set.
pub trait ChangeSource {
    /// Fetch the changed paths, in source order, without duplicates.
    fn changed_files(&self) -> Result<Vec<String>>;
}

/// No change information; every file is treated as unchanged.
pub struct NoChanges;

impl ChangeSource for NoChanges {
    fn changed_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Newline-separated list of paths in a file (`-` reads stdin).
pub struct ListFile {
    pub path: PathBuf,
}

impl ChangeSource for ListFile {
    fn changed_files(&self) -> Result<Vec<String>> {
        let text = read_input(&self.path)?;
        Ok(parse_list(&text))
    }
}

/// Unified diff in a file (`-` reads stdin).
pub struct DiffFile {
    pub path: PathBuf,
}

impl ChangeSource for DiffFile {
    fn changed_files(&self) -> Result<Vec<String>> {
        let text = read_input(&self.path)?;
        Ok(parse_diff(&text))
    }
}

/// Diff from a git command (e.g., `git diff main...HEAD`).
pub struct GitDiff {
    /// Arguments to pass to `git diff`.
    pub args: String,
}

impl ChangeSource for GitDiff {
    fn changed_files(&self) -> Result<Vec<String>> {
        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        let output = Command::new("git")
            .arg("diff")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        let text = String::from_utf8(output.stdout).context("git diff output not valid UTF-8")?;
        Ok(parse_diff(&text))
    }
}

/// Added and modified files of a GitHub pull request.
pub struct PullRequestFiles<'a> {
    pub api: &'a dyn PullRequestApi,
    pub pr_number: u64,
}

impl ChangeSource for PullRequestFiles<'_> {
    /// Permission and not-found errors degrade to an empty change-set.
    fn changed_files(&self) -> Result<Vec<String>> {
        match github::list_changed_files(self.api, self.pr_number) {
            Ok(paths) => Ok(dedup(paths)),
            Err(e) if matches!(e.status(), Some(403 | 404)) => {
                warn!("Couldn't fetch changes of PR #{}: {e}", self.pr_number);
                Ok(Vec::new())
            }
            Err(e) => Err(e).context("Failed to list pull request files"),
        }
    }
}

fn read_input(path: &std::path::Path) -> Result<String> {
    if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// One path per line; blank lines and `#` comments are ignored.
pub fn parse_list(text: &str) -> Vec<String> {
    dedup(
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string),
    )
}

/// Paths of the files a unified diff adds or modifies, taken from the
/// `+++` headers. Deleted files (`+++ /dev/null`) are skipped.
pub fn parse_diff(diff_text: &str) -> Vec<String> {
    dedup(diff_text.lines().filter_map(|line| {
        let rest = line.strip_prefix("+++ ")?;
        // Drop a trailing tab-separated timestamp, as some tools emit.
        let rest = rest.split('\t').next().unwrap_or(rest).trim_end();
        if rest == "/dev/null" {
            return None;
        }
        // Strip common VCS prefixes: "b/" (default git), "a/" (some tools).
        // Also handles --no-prefix diffs where no prefix is present.
        let path = rest
            .strip_prefix("b/")
            .or_else(|| rest.strip_prefix("a/"))
            .unwrap_or(rest);
        Some(path.to_string())
    }))
}

fn dedup(paths: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    paths.into_iter().filter(|p| seen.insert(p.clone())).collect()
}
