//! ferry: point-to-point file transfer over TCP.
//!
//! One peer listens, the other dials; each side streams its files as
//! self-delimiting frames with an MD5 trailer, then reads the peer's frames
//! until `Done`. Directory structure and the executable bit survive the
//! trip; content integrity is verified end to end.
//!
//! The protocol engine lives in [`transfer`]; [`transport`], [`scanner`]
//! and [`progress`] are the collaborators it is wired to in [`session`].

pub mod cli;
pub mod error;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod transfer;
pub mod transport;
