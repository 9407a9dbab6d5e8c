//! Glyphs used across the rendered tables.

pub const RED: &str = "🔴";
pub const GREEN: &str = "🟢";
pub const BLUE: &str = "🔵";
pub const INCREASE: &str = "⬆️";
pub const DECREASE: &str = "⬇️";
pub const EQUAL: &str = "🟰";
pub const TARGET: &str = "🎯";
