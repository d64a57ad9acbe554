use maekawa_wire::PeerId;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("a system needs at least one peer")]
    EmptySystem,
    #[error("peer id {peer} is out of range for n={n}")]
    PeerIdOutOfRange { peer: PeerId, n: u32 },
}
