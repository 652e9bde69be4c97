//! Transfer engine: frame codec, streaming send/receive paths, and safe
//! destination-path reconstruction.
//!
//! The sender emits `FileWithPath` frames followed by a `Done`; the receiver
//! accepts every frame kind that ever existed on this wire so older peers
//! stay interoperable.

pub mod path;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use protocol::{Frame, FrameError, Opcode, DEFAULT_CHUNK_SIZE};
pub use receiver::{Received, Receiver, ReceiverConfig};
pub use sender::{Sender, SenderConfig};
