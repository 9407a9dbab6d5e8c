//! Reduce statement-level hit counts to uncovered line ranges, and format
//! those ranges for display.

use crate::model::{LineRange, StatementCoverage};

/// Coalesce the never-executed statements of one file into line ranges.
///
/// Statements are visited in ascending numeric id order. Consecutive
/// uncovered statements are merged into one range even when their line
/// numbers are not contiguous; only an executed statement in between closes
/// the open range.
#[must_use]
pub fn uncovered_ranges(coverage: &StatementCoverage) -> Vec<LineRange> {
    let mut ranges: Vec<LineRange> = Vec::new();
    let mut current: Option<LineRange> = None;

    for (span, hits) in coverage.ordered() {
        if hits > 0 {
            if let Some(range) = current.take() {
                ranges.push(range);
            }
            continue;
        }

        match current.as_mut() {
            Some(range) => range.end = span.end.line,
            None => current = Some(LineRange::new(span.start.line, span.end.line)),
        }
    }

    if let Some(range) = current {
        ranges.push(range);
    }
    ranges
}

/// Format ranges in compact notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_ranges(ranges: &[LineRange]) -> String {
    ranges
        .iter()
        .map(LineRange::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format ranges as HTML anchors into a blob URL.
///
/// A single line links to `{url}#L{n}`, a range to `{url}#L{start}-L{end}`.
#[must_use]
pub fn format_ranges_linked(ranges: &[LineRange], url: &str) -> String {
    ranges
        .iter()
        .map(|range| {
            let hash = if range.is_single() {
                format!("#L{}", range.start)
            } else {
                format!("#L{}-L{}", range.start, range.end)
            };
            format!("<a href=\"{url}{hash}\" class=\"text-red\">{range}</a>")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    fn coverage(statements: &[(&str, u32, u32, u64)]) -> StatementCoverage {
        let mut cov = StatementCoverage::new("src/file.ts".to_string());
        for &(id, start, end, hits) in statements {
            cov.insert(id, Span::lines(start, end), hits);
        }
        cov
    }

    // -- uncovered_ranges tests ---------------------------------------------

    #[test]
    fn test_uncovered_ranges_empty() {
        assert_eq!(uncovered_ranges(&coverage(&[])), Vec::<LineRange>::new());
    }

    #[test]
    fn test_uncovered_ranges_all_covered() {
        let cov = coverage(&[("0", 1, 1, 1), ("1", 2, 2, 4), ("2", 3, 5, 9)]);
        assert!(uncovered_ranges(&cov).is_empty());
    }

    #[test]
    fn test_uncovered_ranges_all_uncovered() {
        let cov = coverage(&[("0", 1, 1, 0), ("1", 2, 2, 0), ("2", 7, 9, 0)]);
        assert_eq!(uncovered_ranges(&cov), vec![LineRange::new(1, 9)]);
    }

    #[test]
    fn test_uncovered_ranges_split_by_covered_statement() {
        let cov = coverage(&[("0", 1, 1, 0), ("1", 2, 2, 1), ("2", 3, 4, 0)]);
        assert_eq!(
            uncovered_ranges(&cov),
            vec![LineRange::new(1, 1), LineRange::new(3, 4)]
        );
    }

    #[test]
    fn test_uncovered_ranges_merge_across_line_gap() {
        // No statement between lines 2 and 20, so the two stay in one range.
        let cov = coverage(&[("0", 2, 2, 0), ("1", 20, 21, 0)]);
        assert_eq!(uncovered_ranges(&cov), vec![LineRange::new(2, 21)]);
    }

    #[test]
    fn test_uncovered_ranges_sparse_ids() {
        let cov = coverage(&[("0", 1, 1, 0), ("5", 2, 2, 0), ("6", 3, 3, 0)]);
        assert_eq!(uncovered_ranges(&cov), vec![LineRange::new(1, 3)]);
    }

    #[test]
    fn test_uncovered_ranges_numeric_not_lexicographic_order() {
        // Lexicographic order would visit "10" before "2" and merge 1..10.
        let cov = coverage(&[
            ("1", 1, 1, 0),
            ("2", 2, 2, 3),
            ("10", 10, 10, 0),
        ]);
        assert_eq!(
            uncovered_ranges(&cov),
            vec![LineRange::new(1, 1), LineRange::new(10, 10)]
        );
    }

    #[test]
    fn test_uncovered_ranges_hit_count_above_one_is_covered() {
        let cov = coverage(&[("0", 1, 1, 0), ("1", 2, 2, 17), ("2", 3, 3, 0)]);
        assert_eq!(uncovered_ranges(&cov).len(), 2);
    }

    #[test]
    fn test_uncovered_ranges_idempotent() {
        let cov = coverage(&[("0", 1, 1, 0), ("1", 2, 2, 1), ("2", 3, 4, 0)]);
        assert_eq!(uncovered_ranges(&cov), uncovered_ranges(&cov));
    }

    // -- format tests -------------------------------------------------------

    #[test]
    fn test_format_ranges() {
        let ranges = [LineRange::new(1, 1), LineRange::new(3, 5), LineRange::new(8, 8)];
        assert_eq!(format_ranges(&ranges), "1, 3-5, 8");
        assert_eq!(format_ranges(&[]), "");
    }

    #[test]
    fn test_format_ranges_linked() {
        let ranges = [LineRange::new(5, 5), LineRange::new(7, 9)];
        assert_eq!(
            format_ranges_linked(&ranges, "https://x/blob/abc/src/foo.ts"),
            "<a href=\"https://x/blob/abc/src/foo.ts#L5\" class=\"text-red\">5</a>, \
             <a href=\"https://x/blob/abc/src/foo.ts#L7-L9\" class=\"text-red\">7-9</a>"
        );
    }

    #[test]
    fn test_format_ranges_linked_empty() {
        assert_eq!(format_ranges_linked(&[], "https://x"), "");
    }
}
