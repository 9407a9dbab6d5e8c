//! GitHub API helpers: listing pull request files and keeping exactly one
//! managed report comment per pull request and marker.

use std::path::PathBuf;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::{CovreportError, Result};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_SERVER_URL: &str = "https://github.com";
const DEFAULT_MARKER_POSTFIX: &str = "root";
const PER_PAGE: u32 = 100;

/// Hidden marker identifying the managed comment for `postfix`.
#[must_use]
pub fn marker_for(postfix: Option<&str>) -> String {
    let postfix = postfix
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_MARKER_POSTFIX);
    format!("<!-- covreport-marker-{postfix} -->")
}

/// Marker postfix for a run: the report name, else a non-root working
/// directory, else none (the default postfix).
#[must_use]
pub fn marker_postfix<'a>(name: Option<&'a str>, working_directory: &'a str) -> Option<&'a str> {
    name.filter(|n| !n.is_empty())
        .or_else(|| Some(working_directory).filter(|d| !crate::render::is_root_dir(d)))
}

/// An existing issue or pull request comment.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body: Option<String>,
}

/// A file entry of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullFile {
    pub filename: String,
    pub status: String,
}

/// Comment endpoints of the hosting platform.
pub trait CommentApi {
    /// One page (1-based) of comments on a pull request. An empty page ends
    /// the listing.
    fn list_comments(&self, pr_number: u64, page: u32) -> Result<Vec<Comment>>;

    fn update_comment(&self, comment_id: u64, body: &str) -> Result<()>;

    fn create_comment(&self, pr_number: u64, body: &str) -> Result<()>;

    fn create_commit_comment(&self, sha: &str, body: &str) -> Result<()>;
}

/// Pull request endpoints used to build the change-set.
pub trait PullRequestApi {
    /// One page (1-based) of files changed by a pull request.
    fn list_pull_files(&self, pr_number: u64, page: u32) -> Result<Vec<PullFile>>;
}

/// Where a report comment goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    PullRequest(u64),
    Commit(String),
}

/// Terminal state of one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated(u64),
    /// No target was available; nothing was sent.
    Skipped,
    /// The platform refused the write with a recoverable status.
    Rejected(u16),
}

/// Create or update the managed comment for `postfix` on `target`.
///
/// Pull requests are searched page by page for a comment containing the
/// marker; the first match is updated in place, otherwise a new comment is
/// created. Commit targets are always created. Permission (403), not found
/// (404) and payload too large (413) responses are logged and reported as
/// [`PublishOutcome::Rejected`]; every other failure is returned.
pub fn publish(
    api: &dyn CommentApi,
    target: Option<&Target>,
    postfix: Option<&str>,
    markup: &str,
) -> Result<PublishOutcome> {
    let target = match target {
        Some(t) => t,
        None => {
            info!("No pull request number or commit SHA found. Skipping comment creation.");
            return Ok(PublishOutcome::Skipped);
        }
    };

    let marker = marker_for(postfix);
    let body = format!("{markup}\n\n{marker}");

    let result = match target {
        Target::PullRequest(pr_number) => upsert_pr_comment(api, *pr_number, &marker, &body),
        Target::Commit(sha) => api
            .create_commit_comment(sha, &body)
            .map(|()| PublishOutcome::Created),
    };

    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) => match e.status() {
            Some(status @ (403 | 404)) => {
                warn!(
                    "Couldn't write a comment to {}. Make sure the job has the \
                     'pull-requests: write' (or 'contents: write') permission. \
                     Original error: {e}",
                    describe(target)
                );
                Ok(PublishOutcome::Rejected(status))
            }
            Some(413) => {
                warn!(
                    "The coverage report is too large to post as a comment on {}. \
                     Use the report printed to stdout or the job summary instead.",
                    describe(target)
                );
                Ok(PublishOutcome::Rejected(413))
            }
            _ => Err(e),
        },
    }
}

fn describe(target: &Target) -> String {
    match target {
        Target::PullRequest(n) => format!("pull request #{n}"),
        Target::Commit(sha) => format!("commit {sha}"),
    }
}

fn upsert_pr_comment(
    api: &dyn CommentApi,
    pr_number: u64,
    marker: &str,
    body: &str,
) -> Result<PublishOutcome> {
    match find_existing_comment(api, pr_number, marker)? {
        Some(comment_id) => {
            api.update_comment(comment_id, body)?;
            info!("Updated comment {comment_id} on pull request #{pr_number}");
            Ok(PublishOutcome::Updated(comment_id))
        }
        None => {
            api.create_comment(pr_number, body)?;
            info!("Created comment on pull request #{pr_number}");
            Ok(PublishOutcome::Created)
        }
    }
}

/// Find the first comment on a PR whose body contains `marker`.
pub fn find_existing_comment(
    api: &dyn CommentApi,
    pr_number: u64,
    marker: &str,
) -> Result<Option<u64>> {
    let mut page = 1u32;
    loop {
        let comments = api.list_comments(pr_number, page)?;
        if comments.is_empty() {
            break;
        }
        debug!("Searching {} comments on page {page}", comments.len());
        for c in &comments {
            if let Some(ref body) = c.body {
                if body.contains(marker) {
                    return Ok(Some(c.id));
                }
            }
        }
        page += 1;
    }
    Ok(None)
}

/// Every added or modified file of a pull request, across all pages.
pub fn list_changed_files(api: &dyn PullRequestApi, pr_number: u64) -> Result<Vec<String>> {
    info!("Fetching list of changed files for PR #{pr_number}");
    let mut paths = Vec::new();
    let mut page = 1u32;
    loop {
        let files = api.list_pull_files(pr_number, page)?;
        if files.is_empty() {
            break;
        }
        debug!("Received {} files on page {page}", files.len());
        for file in files {
            debug!("[{}] {}", file.status, file.filename);
            if matches!(file.status.as_str(), "added" | "modified") {
                paths.push(file.filename);
            }
        }
        page += 1;
    }
    Ok(paths)
}

/// Resolved GitHub Actions context, read from environment variables.
#[derive(Debug, Clone)]
pub struct Context {
    pub repo: String,
    pub server_url: String,
    pub api_url: String,
    pub pr_number: Option<u64>,
    pub sha: Option<String>,
    /// Checkout directory (`GITHUB_WORKSPACE`), the repository root.
    pub workspace: Option<PathBuf>,
    pub run_id: Option<u64>,
    pub run_number: Option<u64>,
}

impl Context {
    /// Build a context from the standard GitHub Actions environment
    /// (`GITHUB_REPOSITORY`, `GITHUB_SERVER_URL`, `GITHUB_API_URL`,
    /// `GITHUB_REF`, `GITHUB_SHA`, `GITHUB_WORKSPACE`, `GITHUB_RUN_ID`,
    /// `GITHUB_RUN_NUMBER`). Returns `None` outside a repository context.
    pub fn from_env() -> Option<Self> {
        let repo = std::env::var("GITHUB_REPOSITORY").ok()?;
        Some(Self {
            repo,
            server_url: std::env::var("GITHUB_SERVER_URL")
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            pr_number: std::env::var("GITHUB_REF")
                .ok()
                .and_then(|r| pr_number_from_ref(&r)),
            sha: std::env::var("GITHUB_SHA").ok().filter(|s| !s.is_empty()),
            workspace: std::env::var_os("GITHUB_WORKSPACE")
                .filter(|w| !w.is_empty())
                .map(PathBuf::from),
            run_id: env_number("GITHUB_RUN_ID"),
            run_number: env_number("GITHUB_RUN_NUMBER"),
        })
    }
}

fn env_number(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Extract PR number from a ref (e.g. "refs/pull/42/merge" → 42).
pub fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    let parts: Vec<&str> = github_ref.split('/').collect();
    if parts.len() >= 3 && parts[0] == "refs" && parts[1] == "pull" {
        parts[2].parse().ok().filter(|n| *n != 0)
    } else {
        None
    }
}

/// Blocking REST client for the GitHub API.
pub struct Client {
    token: String,
    repo: String,
    api_url: String,
}

impl Client {
    pub fn new(token: String, repo: String, api_url: String) -> Self {
        Self {
            token,
            repo,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}/repos/{}/{}", self.api_url, self.repo, path);
        ureq::request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "covreport")
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    fn send_body(&self, method: &str, path: &str, body: &str) -> Result<()> {
        self.request(method, path)
            .send_json(serde_json::json!({ "body": body }))
            .map_err(api_error)?;
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.request("GET", path).call().map_err(api_error)?;
        resp.into_json::<T>().map_err(CovreportError::Io)
    }
}

fn api_error(err: ureq::Error) -> CovreportError {
    match err {
        ureq::Error::Status(status, resp) => CovreportError::Api {
            status,
            message: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => CovreportError::Transport(t.to_string()),
    }
}

impl CommentApi for Client {
    fn list_comments(&self, pr_number: u64, page: u32) -> Result<Vec<Comment>> {
        self.get_json(&format!(
            "issues/{pr_number}/comments?per_page={PER_PAGE}&page={page}"
        ))
    }

    fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        self.send_body("PATCH", &format!("issues/comments/{comment_id}"), body)
    }

    fn create_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        self.send_body("POST", &format!("issues/{pr_number}/comments"), body)
    }

    fn create_commit_comment(&self, sha: &str, body: &str) -> Result<()> {
        self.send_body("POST", &format!("commits/{sha}/comments"), body)
    }
}

impl PullRequestApi for Client {
    fn list_pull_files(&self, pr_number: u64, page: u32) -> Result<Vec<PullFile>> {
        self.get_json(&format!(
            "pulls/{pr_number}/files?per_page={PER_PAGE}&page={page}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_for() {
        assert_eq!(marker_for(None), "<!-- covreport-marker-root -->");
        assert_eq!(marker_for(Some("")), "<!-- covreport-marker-root -->");
        assert_eq!(marker_for(Some("web")), "<!-- covreport-marker-web -->");
    }

    #[test]
    fn test_marker_postfix() {
        assert_eq!(marker_postfix(Some("web"), "packages/web"), Some("web"));
        assert_eq!(marker_postfix(None, "packages/web"), Some("packages/web"));
        assert_eq!(marker_postfix(Some(""), "./"), None);
    }

    #[test]
    fn test_pr_number_from_ref() {
        assert_eq!(pr_number_from_ref("refs/pull/42/merge"), Some(42));
        assert_eq!(pr_number_from_ref("refs/heads/main"), None);
        assert_eq!(pr_number_from_ref("refs/pull/abc/merge"), None);
        assert_eq!(pr_number_from_ref("refs/pull/0/merge"), None);
    }
}
