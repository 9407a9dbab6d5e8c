//! Resolve the status icon of a coverage percentage.
//!
//! Two kinds of configuration exist: a single pass/fail cut point per
//! category, and a table mapping percentage floors to icons. When a table is
//! configured it always decides the icon; a cut point for the same category
//! is then only shown as a "target" annotation.

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde_json::Value;

use crate::icons;
use crate::model::Category;

/// Optional pass/fail cut point per category, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub lines: Option<f64>,
    pub statements: Option<f64>,
    pub functions: Option<f64>,
    pub branches: Option<f64>,
}

impl Thresholds {
    /// All four categories set to 100%.
    pub fn all_100() -> Self {
        Self {
            lines: Some(100.0),
            statements: Some(100.0),
            functions: Some(100.0),
            branches: Some(100.0),
        }
    }

    #[must_use]
    pub fn get(&self, category: Category) -> Option<f64> {
        match category {
            Category::Lines => self.lines,
            Category::Statements => self.statements,
            Category::Functions => self.functions,
            Category::Branches => self.branches,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|&c| self.get(c).is_none())
    }

    /// Take every value set in `other`, keep ours where `other` has none.
    #[must_use]
    pub fn overridden_by(self, other: Thresholds) -> Thresholds {
        Thresholds {
            lines: other.lines.or(self.lines),
            statements: other.statements.or(self.statements),
            functions: other.functions.or(self.functions),
            branches: other.branches.or(self.branches),
        }
    }

    /// A cut point of 0 reads as unset.
    #[must_use]
    pub fn without_zero(self) -> Thresholds {
        let set = |t: Option<f64>| t.filter(|t| *t != 0.0);
        Thresholds {
            lines: set(self.lines),
            statements: set(self.statements),
            functions: set(self.functions),
            branches: set(self.branches),
        }
    }
}

/// Ordered percentage-floor → icon table, e.g. `{0: 🔴, 80: 🟠, 90: 🟢}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdIcons {
    /// Sorted by floor, highest first.
    tiers: Vec<(f64, String)>,
}

impl ThresholdIcons {
    pub fn new(pairs: impl IntoIterator<Item = (f64, String)>) -> Self {
        let mut tiers: Vec<(f64, String)> = pairs.into_iter().collect();
        tiers.sort_by(|a, b| b.0.total_cmp(&a.0));
        tiers.dedup_by(|a, b| a.0 == b.0);
        Self { tiers }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Icon of the greatest floor that is `<= pct`. Below every floor the
    /// neutral icon is returned.
    #[must_use]
    pub fn icon_for(&self, pct: f64) -> &str {
        self.tiers
            .iter()
            .find(|(floor, _)| pct >= *floor)
            .map(|(_, icon)| icon.as_str())
            .unwrap_or(icons::BLUE)
    }
}

/// Status cell content for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub icon: String,
    /// Cut point to annotate as "target", when one is configured.
    pub target: Option<f64>,
}

/// Everything needed to evaluate a status, resolved once from the options.
#[derive(Debug, Clone, Default)]
pub struct ThresholdConfig {
    pub thresholds: Thresholds,
    pub icons: Option<ThresholdIcons>,
}

impl ThresholdConfig {
    pub fn new(thresholds: Thresholds, icons: Option<ThresholdIcons>) -> Self {
        Self {
            thresholds,
            icons: icons.filter(|i| !i.is_empty()),
        }
    }

    #[must_use]
    pub fn evaluate(&self, category: Category, pct: f64) -> Status {
        let target = self.thresholds.get(category);
        let icon = match (&self.icons, target) {
            (Some(table), _) => table.icon_for(pct).to_string(),
            (None, Some(cut)) if pct >= cut => icons::GREEN.to_string(),
            (None, Some(_)) => icons::RED.to_string(),
            (None, None) => icons::BLUE.to_string(),
        };
        Status { icon, target }
    }
}

/// Unquoted numeric object key, e.g. `80:`.
static NUMERIC_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*:").unwrap());

static IDENTIFIER_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\s*:").unwrap());

/// Parse a threshold-icon table from JSON or a JS object literal such as
/// `{0: '🔴', 80: '🟠', 90: '🟢'}`.
///
/// Invalid entries are skipped with a warning. Returns `None` for blank
/// input, unparsable input, or a table without a single valid entry.
pub fn parse_threshold_icons(input: &str) -> Option<ThresholdIcons> {
    if input.trim().is_empty() {
        return None;
    }

    let quoted = input.replace('\'', "\"");
    let quoted = NUMERIC_KEY.replace_all(&quoted, "\"$1\":");
    let json = IDENTIFIER_KEY.replace_all(&quoted, "\"$1\":");

    let parsed: Value = match serde_json::from_str(&json) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse threshold icons: {e}");
            return None;
        }
    };
    let object = match parsed.as_object() {
        Some(o) => o,
        None => {
            warn!("Invalid threshold icons: expected an object");
            return None;
        }
    };

    let mut pairs = Vec::new();
    for (key, value) in object {
        let floor = match key.parse::<f64>() {
            Ok(f) if f.is_finite() => f,
            _ => {
                warn!("Invalid threshold icon key \"{key}\": expected a number");
                continue;
            }
        };
        match value.as_str() {
            Some(icon) => pairs.push((floor, icon.to_string())),
            None => warn!("Invalid threshold icon for key \"{key}\": expected a string"),
        }
    }

    if pairs.is_empty() {
        warn!("Threshold icons have no valid entries");
        return None;
    }
    Some(ThresholdIcons::new(pairs))
}
