//! Transfer error taxonomy.
//!
//! Every failure the engine can surface, classified so callers branch on
//! class rather than comparing sentinel values. A checksum mismatch is the
//! only non-fatal kind: the file was written in full and the stream is
//! positioned at the next frame, so the session may continue.

use crate::transfer::path::PathError;
use crate::transfer::protocol::FrameError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Truncated or invalid header field, or an unknown opcode.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Read/write/flush failure on the peer stream.
    #[error("stream I/O failed: {0}")]
    Transport(#[source] io::Error),

    /// Stat/open/create/write/chmod failure on a local file.
    #[error("local I/O on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Peer-supplied relative directory failed the safety check.
    #[error(transparent)]
    UnsafePath(#[from] PathError),

    /// A local name or directory cannot be represented on the wire.
    #[error("{path} cannot be represented on the wire")]
    PathEncoding { path: PathBuf },

    /// Digest disagreement after a complete body. The file remains on disk
    /// with the received content.
    #[error("checksum mismatch for {name}: peer sent {expected}, computed {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },
}

impl TransferError {
    pub fn local(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the session must stop. Everything except a checksum mismatch
    /// leaves the stream framing untrustworthy or the local side broken.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::IntegrityMismatch { .. })
    }
}
