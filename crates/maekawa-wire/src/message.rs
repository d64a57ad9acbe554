use serde::{Deserialize, Serialize};

/// A peer identity in `[0, N)`. Identities are totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(v: u32) -> Self {
        PeerId(v)
    }
}

/// A Lamport logical clock value. Monotonically non-decreasing per peer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LamportTs(pub u64);

impl std::fmt::Display for LamportTs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LamportTs {
    pub fn tick(self) -> Self {
        LamportTs(self.0 + 1)
    }

    pub fn observe(self, other: LamportTs) -> Self {
        LamportTs(self.0.max(other.0) + 1)
    }
}

/// `(ts, src)` under strict lexicographic order: lower `ts` wins, ties broken
/// by lower `src`. This is the sole ordering used for arbitration.
pub type Priority = (LamportTs, PeerId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Failed = 0,
    Yield = 1,
    Inquire = 2,
    Request = 3,
    Grant = 4,
    Release = 5,
}

impl MessageKind {
    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::Failed => "FAILED",
            MessageKind::Yield => "YIELD",
            MessageKind::Inquire => "INQUIRE",
            MessageKind::Request => "REQUEST",
            MessageKind::Grant => "GRANT",
            MessageKind::Release => "RELEASE",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => MessageKind::Failed,
            1 => MessageKind::Yield,
            2 => MessageKind::Inquire,
            3 => MessageKind::Request,
            4 => MessageKind::Grant,
            5 => MessageKind::Release,
            other => return Err(other),
        })
    }
}

impl Serialize for MessageKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u8::deserialize(deserializer)?;
        MessageKind::try_from(raw)
            .map_err(|raw| serde::de::Error::custom(format!("unknown msg_type {raw}")))
    }
}

/// A single message exchanged between peers.
///
/// `data` is only meaningful on [`MessageKind::Inquire`], where it carries the
/// `(ts, src)` of the competing request that triggered the inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MessageKind,
    pub src: PeerId,
    pub dest: PeerId,
    pub ts: LamportTs,
    pub data: Option<Priority>,
}

impl Message {
    pub fn new(kind: MessageKind, src: PeerId, dest: PeerId, ts: LamportTs) -> Self {
        Message {
            msg_type: kind,
            src,
            dest,
            ts,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Priority) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_codes() {
        for (kind, code) in [
            (MessageKind::Failed, 0u8),
            (MessageKind::Yield, 1),
            (MessageKind::Inquire, 2),
            (MessageKind::Request, 3),
            (MessageKind::Grant, 4),
            (MessageKind::Release, 5),
        ] {
            assert_eq!(kind as u8, code);
            assert_eq!(MessageKind::try_from(code), Ok(kind));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(MessageKind::try_from(42), Err(42));
    }
}
