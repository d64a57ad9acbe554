//! Wire types for Maekawa's distributed mutual-exclusion protocol.
//!
//! This crate is deliberately small and has no knowledge of sockets: it only
//! defines the [`Message`] the peers exchange and a [`codec::MessageCodec`]
//! that frames them on a byte stream. Can be used outside of `maekawa-core`.

pub mod codec;
mod message;

pub use codec::MessageCodec;
pub use message::{LamportTs, Message, MessageKind, PeerId, Priority};

#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("frame is not terminated by '}}'")]
    UnterminatedFrame,
}
