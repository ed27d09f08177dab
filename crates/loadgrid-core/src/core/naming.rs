// crates/loadgrid-core/src/core/naming.rs
// ============================================================================
// Module: Loadgrid Run Naming
// Description: Slug helpers and target-derived run names.
// Purpose: Derive readable, unique-enough run names from target URLs.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! Run names are the target URL without its scheme, with path separators and
//! dots turned into dashes, followed by a short random suffix and slugified.
//! `https://shop.example.com/cart` with suffix `a1b2c` becomes
//! `shop-example-com-cart-a1b2c`. Randomness lives behind
//! [`crate::interfaces::NameGenerator`]; this module is pure.

use crate::core::identifiers::RunName;

/// Alphabet used for run-name suffixes.
pub const NAME_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
/// Number of characters in a run-name suffix.
pub const NAME_SUFFIX_LEN: usize = 5;

/// Converts text to a lowercase slug.
///
/// Characters other than ASCII alphanumerics, `_`, `-` and whitespace are
/// dropped, runs of whitespace and dashes collapse into one `-`, and leading
/// or trailing `-`/`_` are trimmed.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch == '-' || ch.is_whitespace() {
            pending_dash = true;
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        }
    }
    slug.trim_matches(|ch| ch == '-' || ch == '_').to_string()
}

/// Returns the target with its scheme removed and separators dashed.
#[must_use]
pub fn target_stem(target: &str) -> String {
    target.replace("https://", "").replace("http://", "").replace(['/', '.'], "-")
}

/// Builds a run name from a target URL and a random suffix.
#[must_use]
pub fn run_name_for(target: &str, suffix: &str) -> RunName {
    RunName::new(slugify(&format!("{}-{suffix}", target_stem(target))))
}
