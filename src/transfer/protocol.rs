//! Wire format for the transfer protocol.
//!
//! Frames are self-delimiting: one opcode byte selects a field layout, and
//! the fields follow with no outer length prefix. Textual fields are
//! newline-terminated, integers are 8-byte little-endian.
//!
//! Several frame kinds coexist on the wire so that either peer can interpret
//! whatever opcode it receives:
//!
//! | Opcode | byte | Fields, in order |
//! |---|---|---|
//! | `File` | 1 | name, size, body |
//! | `Done` | 2 | (none) |
//! | `Md5WithFile` | 3 | name, size, checksum, body |
//! | `FileWithMd5` | 4 | name, size, body, checksum |
//! | `FileWithPath` | 5 | name, size, relative path, executable flag, body, checksum |
//!
//! File bodies and trailing digests are streamed by the sender and receiver
//! while hashing; only the header fields live in [`Frame`].

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Separator used inside relative-path fields, independent of the host OS.
pub const PATH_SEPARATOR: char = '/';

/// Body chunk size shared by sender and receiver (10 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    File = 1,
    Done = 2,
    Md5WithFile = 3,
    FileWithMd5 = 4,
    FileWithPath = 5,
}

impl Opcode {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::File),
            2 => Some(Self::Done),
            3 => Some(Self::Md5WithFile),
            4 => Some(Self::FileWithMd5),
            5 => Some(Self::FileWithPath),
            _ => None,
        }
    }
}

/// Frame codec failure, one variant per field so short or invalid input is
/// never silently defaulted.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unable to read opcode")]
    Opcode(#[source] io::Error),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("unable to read file name")]
    Name(#[source] io::Error),
    #[error("file name is not valid UTF-8")]
    NameEncoding,
    #[error("file name {0:?} has no usable final component")]
    InvalidName(String),
    #[error("unable to read file size")]
    Size(#[source] io::Error),
    #[error("unable to read relative path")]
    Path(#[source] io::Error),
    #[error("relative path is not valid UTF-8")]
    PathEncoding,
    #[error("unable to read executable flag")]
    ExecFlag(#[source] io::Error),
    #[error("invalid executable flag {0:#04x}")]
    InvalidExecFlag(u8),
    #[error("unable to read checksum")]
    Checksum(#[source] io::Error),
    #[error("checksum is not valid UTF-8")]
    ChecksumEncoding,
    #[error("{0} must not contain a newline")]
    EmbeddedNewline(&'static str),
}

/// One protocol frame, minus the streamed parts.
///
/// `Md5WithFile` carries its digest before the body, so it is a header
/// field here; `FileWithMd5` and `FileWithPath` carry it after the body and
/// the receiver picks it up with [`read_checksum`] once the body is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    File {
        name: String,
        size: u64,
    },
    Md5WithFile {
        name: String,
        size: u64,
        checksum: String,
    },
    FileWithMd5 {
        name: String,
        size: u64,
    },
    FileWithPath {
        name: String,
        size: u64,
        rel_dir: String,
        executable: bool,
    },
    Done,
}

impl Frame {
    pub fn opcode(&self) -> Opcode {
        match self {
            Frame::File { .. } => Opcode::File,
            Frame::Md5WithFile { .. } => Opcode::Md5WithFile,
            Frame::FileWithMd5 { .. } => Opcode::FileWithMd5,
            Frame::FileWithPath { .. } => Opcode::FileWithPath,
            Frame::Done => Opcode::Done,
        }
    }

    /// Encode the header fields that follow the opcode byte.
    pub fn encode_fields(&self) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::new();
        match self {
            Frame::File { name, size } => {
                put_line(&mut buf, name, "file name")?;
                buf.put_u64_le(*size);
            }
            Frame::Md5WithFile {
                name,
                size,
                checksum,
            } => {
                put_line(&mut buf, name, "file name")?;
                buf.put_u64_le(*size);
                put_line(&mut buf, checksum, "checksum")?;
            }
            Frame::FileWithMd5 { name, size } => {
                put_line(&mut buf, name, "file name")?;
                buf.put_u64_le(*size);
            }
            Frame::FileWithPath {
                name,
                size,
                rel_dir,
                executable,
            } => {
                put_line(&mut buf, name, "file name")?;
                buf.put_u64_le(*size);
                put_line(&mut buf, rel_dir, "relative path")?;
                buf.put_u8(*executable as u8);
            }
            Frame::Done => {}
        }
        Ok(buf.freeze())
    }

    /// Read one opcode byte and that variant's header fields.
    pub async fn decode<R>(reader: &mut R) -> Result<Self, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let opcode = read_opcode(reader).await?;
        let frame = match opcode {
            Opcode::Done => Frame::Done,
            Opcode::File => {
                let (name, size) = read_name_and_size(reader).await?;
                Frame::File { name, size }
            }
            Opcode::Md5WithFile => {
                let (name, size) = read_name_and_size(reader).await?;
                let checksum = read_checksum(reader).await?;
                Frame::Md5WithFile {
                    name,
                    size,
                    checksum,
                }
            }
            Opcode::FileWithMd5 => {
                let (name, size) = read_name_and_size(reader).await?;
                Frame::FileWithMd5 { name, size }
            }
            Opcode::FileWithPath => {
                let (name, size) = read_name_and_size(reader).await?;
                let rel_dir = read_rel_path(reader).await?;
                let executable = read_exec_flag(reader).await?;
                Frame::FileWithPath {
                    name,
                    size,
                    rel_dir,
                    executable,
                }
            }
        };
        Ok(frame)
    }
}

/// Read the digest line that follows a body (or, for `Md5WithFile`,
/// precedes it).
pub async fn read_checksum<R>(reader: &mut R) -> Result<String, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let raw = read_line(reader).await.map_err(FrameError::Checksum)?;
    String::from_utf8(raw).map_err(|_| FrameError::ChecksumEncoding)
}

async fn read_opcode<R>(reader: &mut R) -> Result<Opcode, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let b = reader.read_u8().await.map_err(FrameError::Opcode)?;
    Opcode::from_u8(b).ok_or(FrameError::UnknownOpcode(b))
}

async fn read_name_and_size<R>(reader: &mut R) -> Result<(String, u64), FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let raw = read_line(reader).await.map_err(FrameError::Name)?;
    let name = String::from_utf8(raw).map_err(|_| FrameError::NameEncoding)?;
    let size = reader.read_u64_le().await.map_err(FrameError::Size)?;
    Ok((name, size))
}

async fn read_rel_path<R>(reader: &mut R) -> Result<String, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let raw = read_line(reader).await.map_err(FrameError::Path)?;
    String::from_utf8(raw).map_err(|_| FrameError::PathEncoding)
}

async fn read_exec_flag<R>(reader: &mut R) -> Result<bool, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    match reader.read_u8().await.map_err(FrameError::ExecFlag)? {
        0 => Ok(false),
        1 => Ok(true),
        b => Err(FrameError::InvalidExecFlag(b)),
    }
}

/// Read up to and including a newline; the newline is stripped. A stream
/// that ends mid-line is a truncation, not an implicit terminator.
async fn read_line<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 || line.last() != Some(&b'\n') {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    line.pop();
    Ok(line)
}

fn put_line(buf: &mut BytesMut, value: &str, field: &'static str) -> Result<(), FrameError> {
    if value.contains('\n') {
        return Err(FrameError::EmbeddedNewline(field));
    }
    buf.put_slice(value.as_bytes());
    buf.put_u8(b'\n');
    Ok(())
}
