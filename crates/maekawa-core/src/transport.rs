//! The contract the arbiter/requester core consumes from the network layer.
//!
//! Kept as a trait so the protocol logic can be driven by tests without ever
//! opening a socket; the real TCP implementation lives in the `maekawa`
//! binary crate.

use maekawa_wire::Message;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("no route to peer {0}")]
    UnknownDestination(maekawa_wire::PeerId),
    #[error("peer link closed")]
    LinkClosed,
}

/// Reliably delivers a single [`Message`] to `msg.dest`.
///
/// Implementations must preserve per-sender FIFO end-to-end but need not
/// order messages from distinct senders relative to each other. A failed
/// `send` closes only the affected link; it must never be retried by the
/// core.
pub trait Transport: Send + Sync {
    fn send(&self, msg: Message) -> Result<(), TransportError>;
}
