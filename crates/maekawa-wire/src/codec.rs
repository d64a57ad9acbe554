//! Back-to-back JSON framing, as a [`tokio_util::codec`] pair.
//!
//! Messages are serialized as JSON objects and may arrive concatenated
//! without a delimiter (`{...}{...}`). Since no field of [`Message`] ever
//! contains a literal `{` or `}`, the first unescaped `}` in the buffer always
//! closes exactly one message, so framing reduces to scanning for it.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::{Message, WireError};

#[derive(Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, WireError> {
        let Some(end) = src.iter().position(|&b| b == b'}') else {
            return Ok(None);
        };

        let frame = src.split_to(end + 1);
        let msg = serde_json::from_slice(&frame)?;
        Ok(Some(msg))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, WireError> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            None if src.is_empty() => Ok(None),
            None => Err(WireError::UnterminatedFrame),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = WireError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), WireError> {
        let json = serde_json::to_vec(&item)?;
        dst.extend_from_slice(&json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LamportTs, MessageKind, PeerId};

    fn sample(ts: u64, src: u32) -> Message {
        Message::new(MessageKind::Request, PeerId(src), PeerId(0), LamportTs(ts))
    }

    #[test]
    fn encodes_then_decodes_a_single_message() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        let original = sample(7, 3);
        codec.encode(original, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, original);
        assert!(buf.is_empty());
    }

    #[test]
    fn splits_back_to_back_frames_without_a_delimiter() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        let msgs: Vec<Message> = (0..16).map(|i| sample(i, i as u32 % 4)).collect();
        for m in &msgs {
            codec.encode(*m, &mut buf).unwrap();
        }

        let mut decoded = Vec::new();
        while let Some(msg) = codec.decode(&mut buf).unwrap() {
            decoded.push(msg);
        }
        assert_eq!(decoded, msgs);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        let full = serde_json::to_vec(&sample(1, 1)).unwrap();
        buf.extend_from_slice(&full[..full.len() - 3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 3..]);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn eof_with_unterminated_trailing_bytes_is_an_error() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"{\"msg_type\":3,\"src\":1,\"dest\":0,\"ts\":1");
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::UnterminatedFrame));
    }

    #[test]
    fn eof_with_empty_buffer_is_clean() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }
}
