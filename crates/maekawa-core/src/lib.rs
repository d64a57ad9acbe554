//! Arbiter and requester state machines for Maekawa's √N distributed
//! mutual-exclusion algorithm.
//!
//! This crate has no knowledge of sockets: [`transport::Transport`] is the
//! only thing [`peer::Peer`] depends on to exchange messages, so the whole
//! protocol is unit-testable without a network. The `maekawa` binary crate
//! wires a TCP implementation of `Transport` into it.

pub mod arbiter;
pub mod barrier;
mod error;
pub mod peer;
pub mod quorum;
pub mod requester;
pub mod transport;

pub use error::CoreError;
pub use peer::Peer;
pub use quorum::Quorum;
pub use transport::{Transport, TransportError};
