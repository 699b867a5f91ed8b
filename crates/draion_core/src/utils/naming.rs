//! Page naming: validation of user-typed names and sanitization into store keys.
//!
//! Pure functions with no async or store dependencies. The display name a user
//! types is kept verbatim on the document; only the key is sanitized.

use crate::config::PageRules;
use crate::error::{DraionError, Result};

/// Characters the document store refuses in keys.
const STORE_RESERVED_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// Sanitize a page name into a store key.
///
/// Lowercases, trims, strips store-reserved characters, collapses each run of
/// whitespace into a single `_`, then drops anything outside `[a-z0-9_-]`.
/// May return an empty string; callers decide whether that is an error.
pub fn sanitize_page_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for c in lowered
        .trim()
        .chars()
        .filter(|c| !STORE_RESERVED_CHARS.contains(c))
    {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            out.push(c);
        }
    }

    out
}

/// Whether `key` is already a valid, non-empty store key.
pub fn is_valid_page_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Validate a user-typed page name against the configured length rules.
///
/// Returns the trimmed name on success.
pub fn validate_page_name<'a>(name: &'a str, rules: &PageRules) -> Result<&'a str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DraionError::invalid_page_name("please enter a page name"));
    }

    let len = trimmed.chars().count();
    if len < rules.min_name_len {
        return Err(DraionError::invalid_page_name(format!(
            "the page name must have at least {} characters",
            rules.min_name_len
        )));
    }
    if len > rules.max_name_len {
        return Err(DraionError::invalid_page_name(format!(
            "the page name must have at most {} characters",
            rules.max_name_len
        )));
    }

    Ok(trimmed)
}
