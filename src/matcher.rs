//! Loose process-name matching.
//!
//! Names are compared after lower-casing and dropping a trailing `.exe`, so a
//! target of `Code.exe` matches a process called `code`. Beyond equality, a name
//! longer than three characters also matches when it appears inside the other
//! name. That rule is deliberately permissive: `note` matches `notepad++.exe` and
//! any other process whose name contains it.

use crate::constants::MIN_SUBSTRING_MATCH_LEN;

/// Lower-case `name`, trim whitespace, and strip a trailing `.exe`.
pub fn normalize(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// Whether a target program name matches an observed process name.
pub fn matches(target: &str, candidate: &str) -> bool {
    matches_normalized(&normalize(target), &normalize(candidate))
}

/// Same as [`matches`] for inputs that are already normalized.
pub fn matches_normalized(target: &str, candidate: &str) -> bool {
    if target.is_empty() || candidate.is_empty() {
        return false;
    }

    target == candidate
        || (target.chars().count() > MIN_SUBSTRING_MATCH_LEN && candidate.contains(target))
        || (candidate.chars().count() > MIN_SUBSTRING_MATCH_LEN && target.contains(candidate))
}
