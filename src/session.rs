//! One full exchange over a connection: send every offered file followed by
//! `Done`, then receive until the peer's `Done` or a fatal error.
//!
//! Both peers run the same shape; the only asymmetry is who dialed. The two
//! phases are strictly sequential, there is no interleaving of in-flight
//! files within one role.

use crate::error::TransferError;
use crate::progress::{Direction, TransferBar};
use crate::scanner::{FileEntry, SendItem};
use crate::transfer::protocol::DEFAULT_CHUNK_SIZE;
use crate::transfer::receiver::{Received, Receiver, ReceiverConfig};
use crate::transfer::sender::{Sender, SenderConfig};
use crate::transport::Connection;
use anyhow::Result;
use std::path::PathBuf;
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

pub struct SessionConfig {
    /// Root under which received files land.
    pub dest: PathBuf,
    /// Body chunk size, shared by the send and receive paths.
    pub chunk_size: usize,
}

impl SessionConfig {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Run both phases of a session.
///
/// A fatal error in either phase marks the current item failed and aborts
/// the whole session, since the stream framing can no longer be trusted. A
/// checksum mismatch on a received file is marked as a warning and the loop
/// continues.
pub async fn run(
    conn: &mut Connection,
    items: &[SendItem],
    config: &SessionConfig,
) -> Result<()> {
    let (reader, writer) = conn.halves();

    let mut sender = Sender::new(
        writer,
        SenderConfig {
            chunk_size: config.chunk_size,
        },
    );
    for item in items {
        let mut bar = TransferBar::with_label(Direction::Sending, item.path.display().to_string());
        match send_one(&mut sender, item, &mut bar).await {
            Ok(()) => bar.done(),
            Err(err) => {
                bar.failed(&err);
                return Err(err.into());
            }
        }
    }
    sender.finish().await?;
    debug!(count = items.len(), "send phase finished");

    let mut receiver = Receiver::new(
        reader,
        ReceiverConfig {
            root: config.dest.clone(),
            chunk_size: config.chunk_size,
        },
    );
    loop {
        let mut bar = TransferBar::new(Direction::Receiving);
        match receiver.recv(&mut bar).await {
            Ok(Received::Done) => break,
            Ok(Received::File { name, .. }) => {
                debug!(%name, "received file");
                bar.done();
            }
            Err(err) if !err.is_fatal() => {
                warn!(%err, "integrity mismatch");
                bar.warning(&err);
            }
            Err(err) => {
                bar.failed(&err);
                return Err(err.into());
            }
        }
    }
    Ok(())
}

async fn send_one<W>(
    sender: &mut Sender<W>,
    item: &SendItem,
    bar: &mut TransferBar,
) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let entry = FileEntry::stat(item).await?;
    sender.send_file(&entry, bar).await
}
