//! Enumeration of local files to offer.
//!
//! Command-line arguments expand to [`SendItem`]s: a plain file yields
//! itself, a directory is walked recursively and every regular file inside
//! is offered (hidden files included, ignore rules off). The base of an item
//! is the argument's parent, so sending `docs/` recreates `docs/…` under the
//! peer's root.

use crate::error::TransferError;
use crate::transfer::protocol::PATH_SEPARATOR;
use ignore::WalkBuilder;
use std::io;
use std::path::{Path, PathBuf};

/// A file discovered for sending: the path to read and the base its
/// wire-relative directory is computed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendItem {
    pub path: PathBuf,
    pub base: PathBuf,
}

/// Expand one command-line argument into send items.
pub fn expand(arg: &Path) -> io::Result<Vec<SendItem>> {
    let meta = std::fs::metadata(arg)?;
    let base = arg.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    if !meta.is_dir() {
        return Ok(vec![SendItem {
            path: arg.to_path_buf(),
            base,
        }]);
    }
    let mut items = Vec::new();
    for entry in WalkBuilder::new(arg).standard_filters(false).build() {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_some_and(|t| t.is_file()) {
            items.push(SendItem {
                path: entry.into_path(),
                base: base.clone(),
            });
        }
    }
    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}

/// Everything the sender needs about one local file, captured by a single
/// stat immediately before the transfer. The size streamed on the wire is
/// this size, never re-checked against later reads.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub base: PathBuf,
    pub size: u64,
    pub executable: bool,
}

impl FileEntry {
    pub async fn stat(item: &SendItem) -> Result<Self, TransferError> {
        let meta = tokio::fs::metadata(&item.path)
            .await
            .map_err(|err| TransferError::local(&item.path, err))?;
        Ok(Self {
            path: item.path.clone(),
            base: item.base.clone(),
            size: meta.len(),
            executable: is_exec_any(&meta),
        })
    }

    /// Final path component, if it is wire-representable UTF-8.
    pub fn name(&self) -> Option<String> {
        Some(self.path.file_name()?.to_str()?.to_owned())
    }

    /// Directory of the file relative to the base, `/`-separated for the
    /// wire. Empty when the file sits directly under the base.
    pub fn relative_dir(&self) -> Option<String> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new(""));
        let rel = parent.strip_prefix(&self.base).ok()?;
        let mut segments = Vec::new();
        for component in rel.components() {
            segments.push(component.as_os_str().to_str()?);
        }
        Some(segments.join(&PATH_SEPARATOR.to_string()))
    }
}

/// Execute permission for owner, group, or other.
#[cfg(unix)]
fn is_exec_any(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_exec_any(_meta: &std::fs::Metadata) -> bool {
    false
}
