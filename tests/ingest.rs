mod common;

use covreport::ingest::{read_baseline, read_statements, read_summary};
use covreport::model::Category;
use covreport::ranges::{format_ranges, uncovered_ranges};

#[test]
fn read_summary_fixture() {
    let (_dir, root) = common::default_workspace();
    let snapshot = read_summary(&root.join("coverage/coverage-summary.json")).unwrap();

    assert_eq!(snapshot.files.len(), 3);
    assert_eq!(snapshot.total.get(Category::Lines).pct, 80.0);
    assert_eq!(snapshot.total.get(Category::Branches).covered, 12);

    let key = format!("{}/src/c.ts", root.display());
    assert_eq!(snapshot.get(&key).unwrap().statements.pct, 62.5);
}

#[test]
fn read_summary_unknown_pct_reads_as_full() {
    let (_dir, root) = common::setup_workspace(&[(
        "coverage-summary.json",
        r#"{
            "total": {
                "lines": { "total": 0, "covered": 0, "skipped": 0, "pct": "Unknown" },
                "statements": { "total": 0, "covered": 0, "skipped": 0, "pct": "Unknown" },
                "functions": { "total": 0, "covered": 0, "skipped": 0, "pct": "Unknown" },
                "branches": { "total": 0, "covered": 0, "skipped": 0, "pct": "Unknown" }
            }
        }"#,
    )]);
    let snapshot = read_summary(&root.join("coverage/coverage-summary.json")).unwrap();

    assert!(snapshot.files.is_empty());
    for category in Category::ALL {
        assert_eq!(snapshot.total.get(category).pct, 100.0);
    }
}

#[test]
fn read_summary_missing_or_invalid_is_error() {
    let (_dir, root) = common::setup_workspace(&[("coverage-summary.json", "not json")]);

    assert!(read_summary(&root.join("coverage/coverage-summary.json")).is_err());
    assert!(read_summary(&root.join("coverage/missing.json")).is_err());
}

#[test]
fn read_baseline_optional() {
    assert!(read_baseline(None).unwrap().is_none());

    let (_dir, root) = common::setup_workspace(&[("base.json", common::SUMMARY_BASE)]);
    let path = root.join("coverage/base.json");
    let baseline = read_baseline(Some(&path)).unwrap().unwrap();
    assert_eq!(baseline.total.get(Category::Lines).pct, 70.0);
}

#[test]
fn read_statements_fixture() {
    let (_dir, root) = common::default_workspace();
    let report = read_statements(&root.join("coverage/coverage-final.json"));

    assert_eq!(report.len(), 3);
    let a = &report[&format!("{}/src/a.ts", root.display())];
    assert_eq!(format_ranges(&uncovered_ranges(a)), "1, 3-5");

    let b = &report[&format!("{}/src/b.ts", root.display())];
    assert!(uncovered_ranges(b).is_empty());
}

#[test]
fn read_statements_degrades_to_empty() {
    let (_dir, root) = common::setup_workspace(&[("coverage-final.json", "[1, 2, 3]")]);

    assert!(read_statements(&root.join("coverage/coverage-final.json")).is_empty());
    assert!(read_statements(&root.join("coverage/missing.json")).is_empty());
}
