//! API revision name arithmetic
//!
//! A revisioned API is addressed as `<root>;rev=<n>` with `n >= 1`. The bare
//! root name always denotes the revision that is currently "current" on the
//! service.

use crate::error::{CoreError, Result};

const REVISION_SEPARATOR: &str = ";rev=";

/// Whether `name` denotes the current revision (no `;rev=` suffix).
pub fn is_root_name(name: &str) -> bool {
    !name.contains(REVISION_SEPARATOR)
}

/// The name with any revision suffix stripped.
pub fn root_name(name: &str) -> &str {
    match name.find(REVISION_SEPARATOR) {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Split `root;rev=n` into `(root, n)`; `None` when there is no suffix.
///
/// A suffix that is present but does not parse as a positive integer is an
/// input error, not a plain name.
pub fn parse(name: &str) -> Result<Option<(&str, u32)>> {
    let Some(idx) = name.find(REVISION_SEPARATOR) else {
        return Ok(None);
    };
    let root = &name[..idx];
    let suffix = &name[idx + REVISION_SEPARATOR.len()..];
    match suffix.parse::<u32>() {
        Ok(number) if number >= 1 => Ok(Some((root, number))),
        _ => Err(CoreError::InvalidRevision {
            name: name.to_string(),
            message: format!("'{suffix}' is not a positive integer"),
        }),
    }
}

/// Build `root;rev=n`. `n` must be at least 1.
pub fn combine(root: &str, number: u32) -> Result<String> {
    if number < 1 {
        return Err(CoreError::InvalidRevision {
            name: root.to_string(),
            message: "revision numbers start at 1".to_string(),
        });
    }
    Ok(format!("{root}{REVISION_SEPARATOR}{number}"))
}
