//! Destination-directory reconstruction.
//!
//! The relative directory in a `FileWithPath` frame is peer-controlled
//! input; it is validated before any directory is created.

use crate::error::TransferError;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Rejection of a wire-relative directory, raised before any filesystem
/// mutation and distinguishable from ordinary I/O failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("relative path {0:?} must not be absolute")]
    Absolute(String),
    #[error("relative path {0:?} must not end with a separator")]
    TrailingSeparator(String),
    #[error("relative path {0:?} must not traverse upward")]
    Traversal(String),
    #[error("relative path {0:?} contains an unsupported prefix")]
    Prefix(String),
}

/// Check a wire-relative directory against the safety invariant: not
/// absolute, no trailing separator, no `..` segment anywhere.
pub fn validate_rel_dir(rel_dir: &str) -> Result<(), PathError> {
    if rel_dir.is_empty() {
        return Ok(());
    }
    if rel_dir.starts_with(super::protocol::PATH_SEPARATOR) || Path::new(rel_dir).is_absolute() {
        return Err(PathError::Absolute(rel_dir.to_owned()));
    }
    if rel_dir.ends_with(super::protocol::PATH_SEPARATOR) {
        return Err(PathError::TrailingSeparator(rel_dir.to_owned()));
    }
    for component in Path::new(rel_dir).components() {
        match component {
            Component::ParentDir => return Err(PathError::Traversal(rel_dir.to_owned())),
            Component::Prefix(_) => return Err(PathError::Prefix(rel_dir.to_owned())),
            Component::RootDir => return Err(PathError::Absolute(rel_dir.to_owned())),
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Resolve the destination directory for a wire-relative path, creating any
/// missing intermediate directories.
///
/// An empty string resolves to `root` itself and creates nothing.
pub async fn resolve_dest_dir(root: &Path, rel_dir: &str) -> Result<PathBuf, TransferError> {
    if rel_dir.is_empty() {
        return Ok(root.to_path_buf());
    }
    validate_rel_dir(rel_dir)?;
    let dir = root.join(Path::new(rel_dir));
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|err| TransferError::local(&dir, err))?;
    Ok(dir)
}
