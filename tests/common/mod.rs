#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covreport::config::{Options, ReportArgs};
use tempfile::TempDir;

pub const SUMMARY: &str = include_str!("../fixtures/coverage-summary.json");
pub const SUMMARY_BASE: &str = include_str!("../fixtures/coverage-summary-base.json");
pub const FINAL: &str = include_str!("../fixtures/coverage-final.json");

/// Create a temporary workspace holding the given fixtures under `coverage/`,
/// with `{root}` replaced by the workspace path.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn setup_workspace(fixtures: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("coverage")).unwrap();
    for (name, content) in fixtures {
        write_fixture(&root, name, content);
    }
    (dir, root)
}

/// Like [`setup_workspace`], but the fixtures belong to the package at
/// `package` inside the repository. Returns the repository root.
pub fn setup_package(package: &str, fixtures: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let package_root = root.join(package);
    std::fs::create_dir_all(package_root.join("coverage")).unwrap();
    for (name, content) in fixtures {
        write_fixture(&package_root, name, content);
    }
    (dir, root)
}

pub fn write_fixture(root: &Path, name: &str, content: &str) {
    let text = content.replace("{root}", &root.display().to_string());
    std::fs::write(root.join("coverage").join(name), text).unwrap();
}

/// The default workspace: current summary and coverage-final.
pub fn default_workspace() -> (TempDir, PathBuf) {
    setup_workspace(&[
        ("coverage-summary.json", SUMMARY),
        ("coverage-final.json", FINAL),
    ])
}

/// Resolve options for a workspace with no GitHub context.
pub fn options(root: &Path, args: ReportArgs) -> Options {
    Options::resolve(&args, None, None, root).unwrap()
}
