//! Case-folding rule for category and item names.
//!
//! A name is folded by trimming surrounding whitespace and lowercasing it
//! (Unicode `to_lowercase`). Two names refer to the same record when their
//! folded forms are equal. Folded names are used as store path segments, so
//! they must be non-empty and may not contain `/`.

use thiserror::Error;

/// Reasons a user-supplied name cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,

    #[error("name '{0}' must not contain '/'")]
    ContainsSeparator(String),
}

/// Returns the folded form of `name` used for matching and path keys.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validates a name and returns its folded form.
pub fn validate_name(name: &str) -> Result<String, NameError> {
    let folded = fold_name(name);
    if folded.is_empty() {
        return Err(NameError::Empty);
    }
    if folded.contains('/') {
        return Err(NameError::ContainsSeparator(name.to_string()));
    }
    Ok(folded)
}
