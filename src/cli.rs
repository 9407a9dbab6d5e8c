//! Command handler functions for the covreport CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context as _, Result};
use log::{info, warn};

use crate::changes::{ChangeSource, DiffFile, GitDiff, ListFile, NoChanges, PullRequestFiles};
use crate::compare::{compare, relative_path};
use crate::config::{ChangesFrom, CommentOn, Options};
use crate::github::{self, CommentApi, PublishOutcome, PullRequestApi, Target};
use crate::ingest;
use crate::ranges::{format_ranges, uncovered_ranges};
use crate::render::{render_report, ReportInput};

/// Pick the change-set source for `changes`. A pull request lookup needs
/// an API client; without one the change-set is empty.
pub fn change_source<'a>(
    changes: &ChangesFrom,
    pulls: Option<&'a dyn PullRequestApi>,
) -> Box<dyn ChangeSource + 'a> {
    match changes {
        ChangesFrom::None => Box::new(NoChanges),
        ChangesFrom::List(path) => Box::new(ListFile { path: path.clone() }),
        ChangesFrom::Diff(path) => Box::new(DiffFile { path: path.clone() }),
        ChangesFrom::Git(args) => Box::new(GitDiff { args: args.clone() }),
        ChangesFrom::PullRequest(pr_number) => match pulls {
            Some(api) => Box::new(PullRequestFiles {
                api,
                pr_number: *pr_number,
            }),
            None => {
                warn!("No GitHub token available; cannot list the files changed by PR #{pr_number}.");
                Box::new(NoChanges)
            }
        },
    }
}

/// Read the inputs, classify every file and render the report markup.
pub fn cmd_report(options: &Options, changes: &dyn ChangeSource) -> Result<String> {
    let current = ingest::read_summary(&options.json_summary)?;
    let baseline = ingest::read_baseline(options.json_summary_compare.as_deref())?;
    let statements = ingest::read_statements(&options.json_final);
    let changed = changes
        .changed_files()
        .context("Failed to determine the changed files")?;

    let comparison = compare(
        &current,
        baseline.as_ref(),
        &changed,
        &options.render.repo_root,
    );
    info!(
        "Classified {} files ({} changed)",
        comparison.files.len(),
        comparison.count(crate::compare::Classification::Changed)
    );

    let input = ReportInput {
        total: &current.total,
        baseline_total: baseline.as_ref().map(|b| &b.total),
        comparison: &comparison,
        statements: &statements,
    };
    Ok(render_report(&input, &options.render))
}

/// Publish `markup` to every configured target and describe what happened.
pub fn cmd_comment(options: &Options, api: &dyn CommentApi, markup: &str) -> Result<String> {
    let postfix = github::marker_postfix(
        options.render.name.as_deref(),
        &options.render.working_directory,
    );

    let mut out = String::new();
    if options.comment_on.is_empty() {
        writeln!(out, "Commenting disabled.").unwrap();
        return Ok(out);
    }

    for on in &options.comment_on {
        let target = match on {
            CommentOn::Pr => options.pr_number.map(Target::PullRequest),
            CommentOn::Commit => options.render.commit_sha.clone().map(Target::Commit),
        };
        let outcome = github::publish(api, target.as_ref(), postfix, markup)
            .with_context(|| format!("Failed to publish the report comment ({on})"))?;

        let line = match (&target, outcome) {
            (_, PublishOutcome::Skipped) => format!("{on}: skipped (no target)"),
            (Some(Target::PullRequest(n)), PublishOutcome::Created) => {
                format!("{on}: created comment on PR #{n}")
            }
            (Some(Target::PullRequest(n)), PublishOutcome::Updated(id)) => {
                format!("{on}: updated comment {id} on PR #{n}")
            }
            (Some(Target::Commit(sha)), PublishOutcome::Created | PublishOutcome::Updated(_)) => {
                format!("{on}: created comment on commit {sha}")
            }
            (_, PublishOutcome::Rejected(status)) => {
                format!("{on}: rejected (HTTP {status})")
            }
            (None, _) => format!("{on}: skipped (no target)"),
        };
        writeln!(out, "{line}").unwrap();
    }
    Ok(out)
}

/// Append `markup` to the job summary file at `path`, creating it if needed.
pub fn append_job_summary(path: &Path, markup: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open job summary {}", path.display()))?;
    file.write_all(markup.as_bytes())
        .and_then(|()| file.write_all(b"\n"))
        .with_context(|| format!("Failed to write job summary {}", path.display()))?;
    info!("Appended the report to the job summary");
    Ok(())
}

/// List uncovered line ranges per file of a coverage-final document, or of
/// the single file `source_file` when given.
pub fn cmd_uncovered(
    json_final: &Path,
    workspace_root: &Path,
    source_file: Option<&str>,
) -> Result<String> {
    let statements = ingest::read_statements(json_final);
    let wanted = source_file.map(|f| relative_path(workspace_root, f));

    let mut out = String::new();
    let mut matched = false;
    for (key, coverage) in &statements {
        let path = relative_path(workspace_root, key);
        if wanted.as_ref().is_some_and(|w| *w != path) {
            continue;
        }
        matched = true;

        let ranges = uncovered_ranges(coverage);
        if ranges.is_empty() {
            if wanted.is_some() {
                writeln!(out, "All statements are covered in '{path}'").unwrap();
            }
            continue;
        }
        writeln!(out, "{path}: {}", format_ranges(&ranges)).unwrap();
    }

    if !matched {
        match source_file {
            Some(file) => anyhow::bail!("No statement coverage for '{file}'"),
            None => writeln!(out, "No statement coverage found.").unwrap(),
        }
    } else if out.is_empty() {
        writeln!(out, "All statements are covered.").unwrap();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportArgs;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    const FINAL: &str = r#"{
        "/repo/src/a.ts": {
            "path": "/repo/src/a.ts",
            "statementMap": {
                "0": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 5}},
                "1": {"start": {"line": 2, "column": 0}, "end": {"line": 2, "column": 5}},
                "2": {"start": {"line": 3, "column": 0}, "end": {"line": 4, "column": 5}}
            },
            "s": {"0": 0, "1": 3, "2": 0}
        },
        "/repo/src/b.ts": {
            "path": "/repo/src/b.ts",
            "statementMap": {
                "0": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 5}}
            },
            "s": {"0": 1}
        }
    }"#;

    #[test]
    fn test_cmd_uncovered_all_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "final.json", FINAL);
        let out = cmd_uncovered(&dir.path().join("final.json"), Path::new("/repo"), None).unwrap();
        assert_eq!(out, "src/a.ts: 1, 3-4\n");
    }

    #[test]
    fn test_cmd_uncovered_single_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "final.json", FINAL);
        let path = dir.path().join("final.json");

        let out = cmd_uncovered(&path, Path::new("/repo"), Some("src/b.ts")).unwrap();
        assert_eq!(out, "All statements are covered in 'src/b.ts'\n");

        assert!(cmd_uncovered(&path, Path::new("/repo"), Some("src/zzz.ts")).is_err());
    }

    #[test]
    fn test_cmd_uncovered_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let out = cmd_uncovered(&dir.path().join("nope.json"), dir.path(), None).unwrap();
        assert_eq!(out, "No statement coverage found.\n");
    }

    #[test]
    fn test_cmd_report_missing_summary_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options::resolve(&ReportArgs::default(), None, None, dir.path()).unwrap();
        assert!(cmd_report(&options, &NoChanges).is_err());
    }

    #[test]
    fn test_append_job_summary_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step_summary.md");
        write(dir.path(), "step_summary.md", "## Tests\n");

        append_job_summary(&path, "## Coverage").unwrap();
        append_job_summary(&path, "## Coverage (web)").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "## Tests\n## Coverage\n## Coverage (web)\n");
    }

    #[test]
    fn test_append_job_summary_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        append_job_summary(&path, "report").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "report\n");

        assert!(append_job_summary(&dir.path().join("missing/summary.md"), "report").is_err());
    }

    #[test]
    fn test_change_source_without_client() {
        let source = change_source(&ChangesFrom::PullRequest(3), None);
        assert!(source.changed_files().unwrap().is_empty());
    }
}
