//! Slug derivation from an ordered list of source fields.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

use crate::upsert::schema::Fields;

static DISALLOWED: OnceLock<Regex> = OnceLock::new();
static SEPARATORS: OnceLock<Regex> = OnceLock::new();

/// Build a slug from `sources`, reading each value from `values`.
///
/// Every source contributes one segment, in order, joined with `-`. A source
/// missing from `values` contributes an empty segment, so the join can leave
/// leading, trailing or doubled hyphens (`["name", "city"]` with only a name
/// gives `"clinic-"`).
pub fn derive_slug(sources: &[&str], values: &Fields) -> String {
    sources
        .iter()
        .map(|field| slugify(&display_value(values.get(*field))))
        .collect::<Vec<_>>()
        .join("-")
}

/// Unicode-preserving slugify.
///
/// NFKC-normalizes and lowercases the input, drops everything that is not a
/// word character, whitespace or hyphen, collapses whitespace and hyphen runs
/// into one hyphen and trims hyphens and underscores from both ends.
pub fn slugify(input: &str) -> String {
    let disallowed = DISALLOWED.get_or_init(|| Regex::new(r"[^\w\s-]").unwrap());
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[-\s]+").unwrap());

    let normalized: String = input.nfkc().collect::<String>().to_lowercase();
    let cleaned = disallowed.replace_all(&normalized, "");
    separators
        .replace_all(&cleaned, "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

/// String form of a field value for slug purposes. Absent and null values are empty.
///
/// A null source gives an empty segment rather than the word `none`.
fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
