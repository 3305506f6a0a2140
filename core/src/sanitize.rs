//! Name cleaning for values written to the inventory as names and slugs.
//!
//! Only ASCII letters, digits, `-` and `_` survive. Everything that lands in
//! the inventory as a name or slug passes through [`clean`].

use regex::Regex;
use std::sync::OnceLock;

/// Placeholder used when a discovered value is missing.
pub const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanMode {
    /// Stripped value as-is.
    #[default]
    Identity,
    /// Stripped value, lower-cased.
    Lowercase,
    /// Stripped value, or [`UNSPECIFIED`] when nothing is left.
    PlaceholderIfEmpty,
}

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap())
}

/// Clean `input` according to `mode`. `None` and `""` always yield [`UNSPECIFIED`].
pub fn clean(input: Option<&str>, mode: CleanMode) -> String {
    let raw = match input {
        Some(s) if !s.is_empty() => s,
        _ => return UNSPECIFIED.to_string(),
    };
    let stripped = disallowed().replace_all(raw, "");
    match mode {
        CleanMode::Identity => stripped.into_owned(),
        CleanMode::Lowercase => stripped.to_lowercase(),
        CleanMode::PlaceholderIfEmpty if stripped.is_empty() => UNSPECIFIED.to_string(),
        CleanMode::PlaceholderIfEmpty => stripped.into_owned(),
    }
}
