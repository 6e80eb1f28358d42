//! Dot-delimited field paths into a payload tree.
//!
//! `variables.defenseRating` addresses key `defenseRating` inside the object
//! stored under `variables`. The empty path addresses the whole payload.
//! Payload keys are non-empty and never contain [`PATH_SEPARATOR`]
//! (see [`lore_types::check_keys`]), so each path names exactly one field.

pub use lore_types::PATH_SEPARATOR;

/// Append `key` to `parent`.
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{key}")
    }
}

/// Returns `true` if `path` is `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || (path.starts_with(ancestor)
            && path[ancestor.len()..].starts_with(PATH_SEPARATOR))
}
