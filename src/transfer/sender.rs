//! Sending half of the transfer engine.
//!
//! Streams one file at a time as a `FileWithPath` frame: header fields,
//! then the body in fixed-size chunks with an incremental MD5, then the
//! digest line. Any failure is fatal for the session because the stream
//! framing can no longer be trusted.

use crate::error::TransferError;
use crate::progress::ProgressSink;
use crate::scanner::FileEntry;
use crate::transfer::protocol::{Frame, Opcode, DEFAULT_CHUNK_SIZE};
use md5::{Digest, Md5};
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub struct SenderConfig {
    pub chunk_size: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct Sender<W> {
    writer: W,
    config: SenderConfig,
}

impl<W: AsyncWrite + Unpin> Sender<W> {
    pub fn new(writer: W, config: SenderConfig) -> Self {
        Self { writer, config }
    }

    /// Stream one file to the peer.
    ///
    /// The size and executable bit streamed are the ones captured by the
    /// entry's stat; exactly that many bytes go on the wire, and a source
    /// file that ends early is an error rather than a shorter body.
    pub async fn send_file<P>(&mut self, entry: &FileEntry, progress: &mut P) -> Result<(), TransferError>
    where
        P: ProgressSink,
    {
        let name = entry.name().ok_or_else(|| TransferError::PathEncoding {
            path: entry.path.clone(),
        })?;
        let rel_dir = entry
            .relative_dir()
            .ok_or_else(|| TransferError::PathEncoding {
                path: entry.path.clone(),
            })?;

        let fields = Frame::FileWithPath {
            name: name.clone(),
            size: entry.size,
            rel_dir: rel_dir.clone(),
            executable: entry.executable,
        }
        .encode_fields()?;

        self.writer
            .write_u8(Opcode::FileWithPath as u8)
            .await
            .map_err(TransferError::Transport)?;
        progress.on_header(&rel_dir, &name, entry.size);
        self.writer
            .write_all(&fields)
            .await
            .map_err(TransferError::Transport)?;
        self.writer.flush().await.map_err(TransferError::Transport)?;

        debug!(name = %name, rel_dir = %rel_dir, size = entry.size, "sending file");

        let mut file = File::open(&entry.path)
            .await
            .map_err(|err| TransferError::local(&entry.path, err))?;

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; self.config.chunk_size];
        let mut total: u64 = 0;
        while total < entry.size {
            let want = buf.len().min((entry.size - total) as usize);
            let n = file
                .read(&mut buf[..want])
                .await
                .map_err(|err| TransferError::local(&entry.path, err))?;
            if n == 0 {
                return Err(TransferError::local(
                    &entry.path,
                    io::ErrorKind::UnexpectedEof.into(),
                ));
            }
            hasher.update(&buf[..n]);
            self.writer
                .write_all(&buf[..n])
                .await
                .map_err(TransferError::Transport)?;
            self.writer.flush().await.map_err(TransferError::Transport)?;
            total += n as u64;
            progress.on_progress(total);
        }

        let digest = hex::encode(hasher.finalize());
        self.writer
            .write_all(digest.as_bytes())
            .await
            .map_err(TransferError::Transport)?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(TransferError::Transport)?;
        self.writer.flush().await.map_err(TransferError::Transport)?;
        Ok(())
    }

    /// Tell the peer no further files follow.
    pub async fn finish(&mut self) -> Result<(), TransferError> {
        self.writer
            .write_u8(Opcode::Done as u8)
            .await
            .map_err(TransferError::Transport)?;
        self.writer.flush().await.map_err(TransferError::Transport)
    }
}
