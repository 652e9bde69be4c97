//! Receiving half of the transfer engine.
//!
//! One `recv` call reads one frame and acts on it: file frames land on disk
//! under the configured root while an incremental MD5 runs over the body,
//! `Done` ends the session. The legacy frame kinds without a relative path
//! write into the root itself; `FileWithPath` reconstructs the directory
//! first.

use crate::error::TransferError;
use crate::progress::ProgressSink;
use crate::transfer::path::resolve_dest_dir;
use crate::transfer::protocol::{
    read_checksum, Frame, FrameError, DEFAULT_CHUNK_SIZE, PATH_SEPARATOR,
};
use md5::{Digest, Md5};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// What one [`Receiver::recv`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One file landed on disk.
    File { name: String, rel_dir: String },
    /// The peer finished; no further frames follow.
    Done,
}

pub struct ReceiverConfig {
    /// Root under which received files are reconstructed.
    pub root: PathBuf,
    pub chunk_size: usize,
}

impl ReceiverConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct Receiver<R> {
    reader: R,
    config: ReceiverConfig,
}

impl<R: AsyncBufRead + Unpin> Receiver<R> {
    pub fn new(reader: R, config: ReceiverConfig) -> Self {
        Self { reader, config }
    }

    /// Read one frame and act on it.
    ///
    /// The header callback fires after the header fields and before any body
    /// bytes, so the collaborator can show a total. A checksum mismatch is
    /// returned as the non-fatal [`TransferError::IntegrityMismatch`]; the
    /// file stays on disk and the stream is positioned at the next frame, so
    /// the caller may keep polling.
    pub async fn recv<P>(&mut self, progress: &mut P) -> Result<Received, TransferError>
    where
        P: ProgressSink,
    {
        match Frame::decode(&mut self.reader).await? {
            Frame::Done => {
                debug!("peer is done");
                Ok(Received::Done)
            }
            Frame::File { name, size } => {
                let name = base_name(&name)?.to_owned();
                progress.on_header("", &name, size);
                let dir = self.config.root.clone();
                self.write_body(&dir, &name, size, false, progress).await?;
                Ok(Received::File {
                    name,
                    rel_dir: String::new(),
                })
            }
            Frame::Md5WithFile {
                name,
                size,
                checksum,
            } => {
                let name = base_name(&name)?.to_owned();
                progress.on_header("", &name, size);
                let dir = self.config.root.clone();
                let digest = self.write_body(&dir, &name, size, false, progress).await?;
                verify(&name, &checksum, &digest)?;
                Ok(Received::File {
                    name,
                    rel_dir: String::new(),
                })
            }
            Frame::FileWithMd5 { name, size } => {
                let name = base_name(&name)?.to_owned();
                progress.on_header("", &name, size);
                let dir = self.config.root.clone();
                let digest = self.write_body(&dir, &name, size, false, progress).await?;
                let expected = read_checksum(&mut self.reader).await?;
                verify(&name, &expected, &digest)?;
                Ok(Received::File {
                    name,
                    rel_dir: String::new(),
                })
            }
            Frame::FileWithPath {
                name,
                size,
                rel_dir,
                executable,
            } => {
                let name = base_name(&name)?.to_owned();
                progress.on_header(&rel_dir, &name, size);
                // Safety check and mkdir happen here, before any body bytes.
                let dir = resolve_dest_dir(&self.config.root, &rel_dir).await?;
                let digest = self
                    .write_body(&dir, &name, size, executable, progress)
                    .await?;
                let expected = read_checksum(&mut self.reader).await?;
                verify(&name, &expected, &digest)?;
                Ok(Received::File { name, rel_dir })
            }
        }
    }

    /// Stream exactly `size` body bytes into `dir/name`, hashing as they
    /// land. EOF before `size` bytes is a fatal transport error; the partial
    /// file is left behind, closed.
    async fn write_body<P>(
        &mut self,
        dir: &Path,
        name: &str,
        size: u64,
        executable: bool,
        progress: &mut P,
    ) -> Result<String, TransferError>
    where
        P: ProgressSink,
    {
        let path = dir.join(name);
        let mut file = File::create(&path)
            .await
            .map_err(|err| TransferError::local(&path, err))?;
        if executable {
            add_execute_bits(&path)
                .await
                .map_err(|err| TransferError::local(&path, err))?;
        }

        debug!(path = %path.display(), size, "receiving file");

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; self.config.chunk_size];
        let mut total: u64 = 0;
        while total < size {
            let want = buf.len().min((size - total) as usize);
            let n = self
                .reader
                .read(&mut buf[..want])
                .await
                .map_err(TransferError::Transport)?;
            if n == 0 {
                return Err(TransferError::Transport(io::ErrorKind::UnexpectedEof.into()));
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .await
                .map_err(|err| TransferError::local(&path, err))?;
            total += n as u64;
            progress.on_progress(total);
        }
        file.flush()
            .await
            .map_err(|err| TransferError::local(&path, err))?;
        Ok(hex::encode(hasher.finalize()))
    }
}

fn verify(name: &str, expected: &str, actual: &str) -> Result<(), TransferError> {
    if expected != actual {
        return Err(TransferError::IntegrityMismatch {
            name: name.to_owned(),
            expected: expected.to_owned(),
            actual: actual.to_owned(),
        });
    }
    Ok(())
}

/// A peer-supplied name contributes only its final component; an empty or
/// dot-only result is rejected.
fn base_name(raw: &str) -> Result<&str, FrameError> {
    let name = raw.rsplit(PATH_SEPARATOR).next().unwrap_or(raw);
    if name.is_empty() || name == "." || name == ".." {
        return Err(FrameError::InvalidName(raw.to_owned()));
    }
    Ok(name)
}

#[cfg(unix)]
async fn add_execute_bits(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn add_execute_bits(_path: &Path) -> io::Result<()> {
    Ok(())
}
