//! TCP transport: one connected, ordered byte stream per session, with
//! independent buffered read and write halves.
//!
//! Protocol handling lives in [`crate::transfer`]; this module only dials,
//! accepts exactly one peer, and tears the stream down.

use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::debug;

pub struct Connection {
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Connection {
    /// Connect to a listening peer.
    pub async fn dial(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (read, write) = stream.into_split();
        Ok(Self {
            peer,
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The buffered halves, for the protocol engine.
    pub fn halves(&mut self) -> (&mut BufReader<OwnedReadHalf>, &mut BufWriter<OwnedWriteHalf>) {
        (&mut self.reader, &mut self.writer)
    }

    /// Flush and shut down the write side, then drop the stream.
    pub async fn disconnect(mut self) -> io::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        debug!(peer = %self.peer, "disconnected");
        Ok(())
    }
}

/// Bound socket waiting for the single peer of a session.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr).await?,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accept exactly one peer; the listening socket closes afterwards.
    pub async fn accept(self) -> io::Result<Connection> {
        let (stream, peer) = self.inner.accept().await?;
        debug!(%peer, "peer connected");
        Connection::from_stream(stream)
    }
}
