//! Option resolution: command line, environment and an optional TOML file,
//! collapsed once into an [`Options`] value.
//!
//! Precedence is command line (including its environment fallbacks), then
//! the config file, then built-in defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use log::{debug, warn, LevelFilter};
use serde::Deserialize;

use crate::github::Context;
use crate::render::{FileCoverageMode, RenderOptions, RepoLinks, WorkflowRun};
use crate::threshold::{parse_threshold_icons, ThresholdConfig, ThresholdIcons, Thresholds};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "covreport.toml";

const DEFAULT_JSON_SUMMARY: &str = "coverage/coverage-summary.json";
const DEFAULT_JSON_FINAL: &str = "coverage/coverage-final.json";
const DEFAULT_DECIMAL_PLACES: usize = 2;

/// Report inputs shared by the `report` and `comment` commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Path to the json-summary coverage report.
    #[arg(long)]
    pub json_summary: Option<PathBuf>,

    /// Path to the coverage-final (istanbul json) report, for uncovered lines.
    #[arg(long)]
    pub json_final: Option<PathBuf>,

    /// json-summary of the baseline (e.g. the target branch) to compare against.
    #[arg(long)]
    pub json_summary_compare: Option<PathBuf>,

    /// Directory all other paths are relative to (default: ./).
    #[arg(long)]
    pub working_directory: Option<String>,

    /// Report name, shown in the headline and used to tell comments apart.
    #[arg(long)]
    pub name: Option<String>,

    /// Which files to list: all, affected, changes or none.
    #[arg(long)]
    pub file_coverage_mode: Option<String>,

    /// Newline-separated list of changed files (`-` for stdin).
    #[arg(long, conflicts_with_all = ["diff", "git_diff"])]
    pub changed_files: Option<PathBuf>,

    /// Unified diff to take changed files from (`-` for stdin).
    #[arg(long, conflicts_with = "git_diff")]
    pub diff: Option<PathBuf>,

    /// Arguments for `git diff` to take changed files from, e.g. "main...HEAD".
    #[arg(long)]
    pub git_diff: Option<String>,

    /// Pull request number (default: from GITHUB_REF).
    #[arg(long, env = "COVREPORT_PR_NUMBER")]
    pub pr_number: Option<u64>,

    /// Commit SHA for links (default: GITHUB_SHA).
    #[arg(long)]
    pub commit_sha: Option<String>,

    /// Percentage → icon table, e.g. "{0: '🔴', 80: '🟠', 90: '🟢'}".
    #[arg(long)]
    pub threshold_icons: Option<String>,

    #[arg(long)]
    pub threshold_lines: Option<f64>,

    #[arg(long)]
    pub threshold_statements: Option<f64>,

    #[arg(long)]
    pub threshold_functions: Option<f64>,

    #[arg(long)]
    pub threshold_branches: Option<f64>,

    /// Decimal places of percentage deltas.
    #[arg(long)]
    pub decimal_places: Option<usize>,

    /// Config file (default: covreport.toml in the working directory, if present).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// `[thresholds]` table of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdSection {
    pub lines: Option<f64>,
    pub statements: Option<f64>,
    pub functions: Option<f64>,
    pub branches: Option<f64>,
    /// Shorthand for all four at 100%.
    #[serde(alias = "100")]
    pub all100: bool,
}

impl ThresholdSection {
    fn resolve(&self) -> Thresholds {
        if self.all100 {
            return Thresholds::all_100();
        }
        Thresholds {
            lines: self.lines,
            statements: self.statements,
            functions: self.functions,
            branches: self.branches,
        }
    }
}

/// Contents of a `covreport.toml` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub name: Option<String>,
    pub json_summary: Option<PathBuf>,
    pub json_final: Option<PathBuf>,
    pub json_summary_compare: Option<PathBuf>,
    pub file_coverage_mode: Option<String>,
    pub comment_on: Option<String>,
    pub decimal_places: Option<usize>,
    pub log_level: Option<String>,
    pub thresholds: ThresholdSection,
    pub threshold_icons: Option<BTreeMap<String, String>>,
}

impl FileConfig {
    pub fn parse(text: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load an explicitly requested file (errors are fatal) or the default
    /// file in `working_dir`. The default file is skipped when missing and
    /// falls back to defaults with a warning when unreadable or invalid.
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        let path = working_dir.join(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        match Self::read(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Ignoring config file: {e:#}");
                Ok(Self::default())
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn threshold_icons(&self) -> Option<ThresholdIcons> {
        let table = self.threshold_icons.as_ref()?;
        let mut pairs = Vec::new();
        for (key, icon) in table {
            match key.trim().parse::<f64>() {
                Ok(floor) if floor.is_finite() => pairs.push((floor, icon.clone())),
                _ => warn!("Invalid threshold icon key \"{key}\": expected a number"),
            }
        }
        Some(ThresholdIcons::new(pairs))
    }
}

/// Where to post the report comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOn {
    Pr,
    Commit,
}

impl fmt::Display for CommentOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentOn::Pr => f.write_str("pr"),
            CommentOn::Commit => f.write_str("commit"),
        }
    }
}

/// Parse a comma-separated `pr,commit` list. `none` disables commenting;
/// unknown entries are dropped with a warning, and a list without any valid
/// entry falls back to `pr`.
pub fn parse_comment_on(input: &str) -> Vec<CommentOn> {
    if input.trim() == "none" {
        return Vec::new();
    }

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for item in input.split(',').map(str::trim) {
        match item {
            "pr" => valid.push(CommentOn::Pr),
            "commit" => valid.push(CommentOn::Commit),
            other => invalid.push(other),
        }
    }
    valid.dedup();

    if valid.is_empty() {
        warn!("No valid options for comment-on found. Falling back to \"pr\".");
        return vec![CommentOn::Pr];
    }
    if !invalid.is_empty() {
        warn!(
            "Invalid options for comment-on: {}. Valid options are \"pr\" and \"commit\".",
            invalid.join(", ")
        );
    }
    valid
}

/// How the change-set is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesFrom {
    None,
    List(PathBuf),
    Diff(PathBuf),
    Git(String),
    PullRequest(u64),
}

/// Fully resolved options for one run.
#[derive(Debug, Clone)]
pub struct Options {
    pub json_summary: PathBuf,
    pub json_final: PathBuf,
    pub json_summary_compare: Option<PathBuf>,
    pub changes: ChangesFrom,
    pub pr_number: Option<u64>,
    pub comment_on: Vec<CommentOn>,
    pub log_level: Option<LevelFilter>,
    /// Absolute working directory; input paths are relative to it.
    pub workspace_root: PathBuf,
    pub render: RenderOptions,
}

impl Options {
    /// Resolve the command line against the config file and the GitHub
    /// context. `cwd` anchors a relative working directory and is the
    /// repository root unless the context names a checkout directory.
    pub fn resolve(
        args: &ReportArgs,
        comment_on: Option<&str>,
        github: Option<&Context>,
        cwd: &Path,
    ) -> Result<Self> {
        let working_directory = args
            .working_directory
            .clone()
            .unwrap_or_else(|| "./".to_string());
        let workspace_root = normalize(&cwd.join(&working_directory));
        let repo_root = normalize(
            &github
                .and_then(|g| g.workspace.as_deref())
                .map_or_else(|| cwd.to_path_buf(), |w| cwd.join(w)),
        );

        let file = FileConfig::load(args.config.as_deref(), &workspace_root)?;

        let resolve_path = |cli: &Option<PathBuf>, from_file: &Option<PathBuf>| {
            cli.clone()
                .or_else(|| from_file.clone())
                .map(|p| workspace_root.join(p))
        };
        let json_summary = resolve_path(&args.json_summary, &file.json_summary)
            .unwrap_or_else(|| workspace_root.join(DEFAULT_JSON_SUMMARY));
        let json_final = resolve_path(&args.json_final, &file.json_final)
            .unwrap_or_else(|| workspace_root.join(DEFAULT_JSON_FINAL));
        let json_summary_compare =
            resolve_path(&args.json_summary_compare, &file.json_summary_compare);

        let mode = args
            .file_coverage_mode
            .as_deref()
            .or(file.file_coverage_mode.as_deref())
            .map(FileCoverageMode::from_input)
            .unwrap_or_default();

        let comment_on = comment_on
            .or(file.comment_on.as_deref())
            .map(parse_comment_on)
            .unwrap_or_else(|| vec![CommentOn::Pr]);

        let log_level = file.log_level.as_deref().and_then(|level| {
            level
                .parse::<LevelFilter>()
                .map_err(|_| warn!("Invalid log_level \"{level}\" in config file, ignoring it"))
                .ok()
        });

        let cli_thresholds = Thresholds {
            lines: args.threshold_lines,
            statements: args.threshold_statements,
            functions: args.threshold_functions,
            branches: args.threshold_branches,
        };
        let thresholds = file
            .thresholds
            .resolve()
            .overridden_by(cli_thresholds)
            .without_zero();
        let icons = match args.threshold_icons.as_deref() {
            Some(input) => parse_threshold_icons(input),
            None => file.threshold_icons(),
        };

        let pr_number = args
            .pr_number
            .filter(|n| *n != 0)
            .or_else(|| github.and_then(|g| g.pr_number));
        let commit_sha = args
            .commit_sha
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| github.and_then(|g| g.sha.clone()));

        let changes = if let Some(ref p) = args.changed_files {
            ChangesFrom::List(p.clone())
        } else if let Some(ref p) = args.diff {
            ChangesFrom::Diff(p.clone())
        } else if let Some(ref a) = args.git_diff {
            ChangesFrom::Git(a.clone())
        } else if mode == FileCoverageMode::None {
            ChangesFrom::None
        } else if let Some(n) = pr_number {
            ChangesFrom::PullRequest(n)
        } else {
            ChangesFrom::None
        };

        let links = match (github, commit_sha.as_ref()) {
            (Some(g), Some(sha)) => Some(RepoLinks {
                server_url: g.server_url.clone(),
                repository: g.repo.clone(),
                sha: sha.clone(),
            }),
            _ => None,
        };

        Ok(Options {
            json_summary,
            json_final,
            json_summary_compare,
            changes,
            pr_number,
            comment_on,
            log_level,
            render: RenderOptions {
                name: args.name.clone().or(file.name).filter(|n| !n.is_empty()),
                working_directory,
                repo_root,
                mode,
                decimal_places: args
                    .decimal_places
                    .or(file.decimal_places)
                    .unwrap_or(DEFAULT_DECIMAL_PLACES),
                thresholds: ThresholdConfig::new(thresholds, icons),
                links,
                commit_sha,
                workflow_run: github.and_then(|g| {
                    Some(WorkflowRun {
                        id: g.run_id?,
                        number: g.run_number?,
                    })
                }),
            },
            workspace_root,
        })
    }
}

/// Lexically drop `.` and resolve `..` components.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github() -> Context {
        Context {
            repo: "owner/repo".to_string(),
            server_url: "https://github.com".to_string(),
            api_url: "https://api.github.com".to_string(),
            pr_number: Some(12),
            sha: Some("deadbeef".to_string()),
            workspace: None,
            run_id: None,
            run_number: None,
        }
    }

    #[test]
    fn test_parse_comment_on() {
        assert_eq!(parse_comment_on("pr"), vec![CommentOn::Pr]);
        assert_eq!(
            parse_comment_on("pr, commit"),
            vec![CommentOn::Pr, CommentOn::Commit]
        );
        assert_eq!(parse_comment_on("none"), vec![]);
        assert_eq!(parse_comment_on("bogus"), vec![CommentOn::Pr]);
        assert_eq!(parse_comment_on("commit,bogus"), vec![CommentOn::Commit]);
    }

    #[test]
    fn test_file_config_parse() {
        let config = FileConfig::parse(
            r#"
            name = "web"
            file_coverage_mode = "all"
            decimal_places = 1

            [thresholds]
            lines = 80
            branches = 70.5

            [threshold_icons]
            "0" = "🔴"
            "90" = "🟢"
            "#,
        )
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("web"));
        assert_eq!(config.thresholds.resolve().lines, Some(80.0));
        assert_eq!(config.thresholds.resolve().branches, Some(70.5));
        assert_eq!(config.threshold_icons().unwrap().icon_for(95.0), "🟢");
    }

    #[test]
    fn test_file_config_all100() {
        let config = FileConfig::parse("[thresholds]\nall100 = true\nlines = 50\n").unwrap();
        assert_eq!(config.thresholds.resolve(), Thresholds::all_100());
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        assert!(FileConfig::parse("colour = \"red\"").is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options::resolve(&ReportArgs::default(), None, None, dir.path()).unwrap();

        assert_eq!(opts.json_summary, dir.path().join(DEFAULT_JSON_SUMMARY));
        assert_eq!(opts.render.mode, FileCoverageMode::Changes);
        assert_eq!(opts.render.decimal_places, 2);
        assert_eq!(opts.comment_on, vec![CommentOn::Pr]);
        assert_eq!(opts.changes, ChangesFrom::None);
        assert!(opts.render.links.is_none());
        assert!(opts.render.thresholds.thresholds.is_empty());
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "name = \"from-file\"\nfile_coverage_mode = \"all\"\n[thresholds]\nlines = 50\nbranches = 40\n",
        )
        .unwrap();

        let args = ReportArgs {
            name: Some("from-cli".to_string()),
            threshold_lines: Some(90.0),
            ..Default::default()
        };
        let opts = Options::resolve(&args, Some("commit"), Some(&github()), dir.path()).unwrap();

        assert_eq!(opts.render.name.as_deref(), Some("from-cli"));
        assert_eq!(opts.render.mode, FileCoverageMode::All);
        assert_eq!(opts.render.thresholds.thresholds.lines, Some(90.0));
        assert_eq!(opts.render.thresholds.thresholds.branches, Some(40.0));
        assert_eq!(opts.comment_on, vec![CommentOn::Commit]);
        assert_eq!(opts.pr_number, Some(12));
        assert_eq!(opts.changes, ChangesFrom::PullRequest(12));
        let links = opts.render.links.unwrap();
        assert_eq!(links.sha, "deadbeef");
    }

    #[test]
    fn test_resolve_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("web")).unwrap();
        let args = ReportArgs {
            working_directory: Some("./web".to_string()),
            json_summary: Some(PathBuf::from("out/summary.json")),
            ..Default::default()
        };
        let opts = Options::resolve(&args, None, None, dir.path()).unwrap();
        assert_eq!(opts.workspace_root, dir.path().join("web"));
        assert_eq!(opts.render.repo_root, dir.path());
        assert_eq!(opts.json_summary, dir.path().join("web/out/summary.json"));
        assert_eq!(opts.render.working_directory, "./web");
    }

    #[test]
    fn test_resolve_repo_root_from_checkout_directory() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = dir.path().join("checkout");
        let context = Context {
            workspace: Some(checkout.clone()),
            ..github()
        };
        let args = ReportArgs {
            working_directory: Some("packages/web".to_string()),
            ..Default::default()
        };
        let opts = Options::resolve(&args, None, Some(&context), &checkout).unwrap();
        assert_eq!(opts.render.repo_root, checkout);
        assert_eq!(opts.workspace_root, checkout.join("packages/web"));
    }

    #[test]
    fn test_resolve_invalid_default_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "name = \"web\"\n[thresholds]\nlines = \"eighty\"\n",
        )
        .unwrap();

        let opts = Options::resolve(&ReportArgs::default(), None, None, dir.path()).unwrap();
        assert_eq!(opts.render.name, None);
        assert!(opts.render.thresholds.thresholds.is_empty());

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "colour = \"red\"\n").unwrap();
        assert!(Options::resolve(&ReportArgs::default(), None, None, dir.path()).is_ok());
    }

    #[test]
    fn test_resolve_invalid_explicit_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[thresholds]\nlines = \"eighty\"\n").unwrap();
        let args = ReportArgs {
            config: Some(path),
            ..Default::default()
        };
        assert!(Options::resolve(&args, None, None, dir.path()).is_err());
    }

    #[test]
    fn test_resolve_invalid_log_level_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "name = \"web\"\nlog_level = \"chatty\"\n",
        )
        .unwrap();

        let opts = Options::resolve(&ReportArgs::default(), None, None, dir.path()).unwrap();
        assert_eq!(opts.log_level, None);
        assert_eq!(opts.render.name.as_deref(), Some("web"));

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "log_level = \"debug\"\n").unwrap();
        let opts = Options::resolve(&ReportArgs::default(), None, None, dir.path()).unwrap();
        assert_eq!(opts.log_level, Some(LevelFilter::Debug));
    }

    #[test]
    fn test_resolve_zero_threshold_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[thresholds]\nlines = 0\nbranches = 60\n",
        )
        .unwrap();
        let args = ReportArgs {
            threshold_functions: Some(0.0),
            ..Default::default()
        };

        let opts = Options::resolve(&args, None, None, dir.path()).unwrap();
        let thresholds = opts.render.thresholds.thresholds;
        assert_eq!(thresholds.lines, None);
        assert_eq!(thresholds.functions, None);
        assert_eq!(thresholds.branches, Some(60.0));
    }

    #[test]
    fn test_resolve_workflow_run() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context {
            run_id: Some(555),
            run_number: Some(7),
            ..github()
        };
        let opts = Options::resolve(&ReportArgs::default(), None, Some(&context), dir.path()).unwrap();
        assert_eq!(opts.render.workflow_run, Some(WorkflowRun { id: 555, number: 7 }));

        let context = Context {
            run_id: Some(555),
            ..github()
        };
        let opts = Options::resolve(&ReportArgs::default(), None, Some(&context), dir.path()).unwrap();
        assert_eq!(opts.render.workflow_run, None);
    }

    #[test]
    fn test_resolve_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReportArgs {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };
        assert!(Options::resolve(&args, None, None, dir.path()).is_err());
    }

    #[test]
    fn test_resolve_changes_source() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReportArgs {
            git_diff: Some("main...HEAD".to_string()),
            ..Default::default()
        };
        let opts = Options::resolve(&args, None, Some(&github()), dir.path()).unwrap();
        assert_eq!(opts.changes, ChangesFrom::Git("main...HEAD".to_string()));

        let args = ReportArgs {
            file_coverage_mode: Some("none".to_string()),
            ..Default::default()
        };
        let opts = Options::resolve(&args, None, Some(&github()), dir.path()).unwrap();
        assert_eq!(opts.changes, ChangesFrom::None);
    }
}
