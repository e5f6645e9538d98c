use std::fs;
use std::path::{Path, PathBuf};

use crate::spec::MirrorError;

////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// Whether one directory contains the other after normalization.
///
/// A destination that does not exist yet is resolved through its nearest
/// existing ancestor, so `src/new_dir` still counts as inside `src`.
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _resolve_through_existing_ancestor(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

fn _resolve_through_existing_ancestor(path: &Path) -> PathBuf {
    let path_abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    let mut l_tail = Vec::new();
    let mut path_cursor = path_abs.as_path();
    loop {
        if let Ok(resolved) = fs::canonicalize(path_cursor) {
            let mut path_out = resolved;
            for part in l_tail.iter().rev() {
                path_out.push(part);
            }
            return path_out;
        }
        match (path_cursor.parent(), path_cursor.file_name()) {
            (Some(parent), Some(name)) => {
                l_tail.push(name.to_os_string());
                path_cursor = parent;
            }
            _ => return path_abs,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Wildcards

/// Reject an empty wildcard list or a blank entry.
///
/// The tool's filespecs only treat `*` and `?` as special; everything else,
/// `[` and `{` included, is passed through untouched.
pub(crate) fn validate_mirror_wildcards(wildcards: &[String]) -> Result<(), MirrorError> {
    if wildcards.is_empty() {
        return Err(MirrorError::InvalidWildcard(
            "At least one wildcard is required.".to_string(),
        ));
    }
    if wildcards.iter().any(|wildcard| wildcard.trim().is_empty()) {
        return Err(MirrorError::InvalidWildcard(
            "Wildcard must not be blank.".to_string(),
        ));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
