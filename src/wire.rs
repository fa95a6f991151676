//! The peer wire protocol's length-prefixed message framing (`spec.md` §4.D).
//!
//! Grounded on `muhtutorials-bittorrent`'s `peer.rs` `MessageFramer`.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// 16 KiB, the maximum size of a requested block (`spec.md` §3).
pub const BLOCK_SIZE: usize = 1 << 14;

/// Frames larger than this are rejected outright to bound memory use.
const MAX_FRAME_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

impl TryFrom<u8> for MessageId {
    type Error = io::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageId::*;
        match value {
            0 => Ok(Choke),
            1 => Ok(Unchoke),
            2 => Ok(Interested),
            3 => Ok(NotInterested),
            4 => Ok(Have),
            5 => Ok(Bitfield),
            6 => Ok(Request),
            7 => Ok(Piece),
            8 => Ok(Cancel),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown peer message id {other}"),
            )),
        }
    }
}

/// A single framed peer message. `len == 0` keep-alives are swallowed by the
/// framer and never surfaced as a `Message`.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn interested() -> Self {
        Self::new(MessageId::Interested, Vec::new())
    }

    pub fn request(index: u32, begin: u32, length: u32) -> Self {
        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&index.to_be_bytes());
        payload.extend_from_slice(&begin.to_be_bytes());
        payload.extend_from_slice(&length.to_be_bytes());
        Self::new(MessageId::Request, payload)
    }

    /// Parses a `piece` message payload into `(index, begin, block)`.
    pub fn parse_piece(&self) -> io::Result<(u32, u32, &[u8])> {
        if self.id != MessageId::Piece || self.payload.len() < 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a well-formed piece message",
            ));
        }
        let index = u32::from_be_bytes(self.payload[0..4].try_into().unwrap());
        let begin = u32::from_be_bytes(self.payload[4..8].try_into().unwrap());
        Ok((index, begin, &self.payload[8..]))
    }
}

/// Codec for `<len:u32><id:u8><payload>` framed peer messages.
pub struct MessageFramer;

impl Decoder for MessageFramer {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Message>> {
        if src.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes(src[..4].try_into().unwrap()) as usize;
        if length == 0 {
            // Keep-alive: discard and look for the next frame.
            src.advance(4);
            return self.decode(src);
        }
        if length > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of length {length} exceeds the {MAX_FRAME_LEN} byte limit"),
            ));
        }
        if src.len() < 4 + length {
            src.reserve(4 + length - src.len());
            return Ok(None);
        }
        let id = MessageId::try_from(src[4])?;
        let payload = src[5..4 + length].to_vec();
        src.advance(4 + length);
        Ok(Some(Message { id, payload }))
    }
}

impl Encoder<Message> for MessageFramer {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> io::Result<()> {
        let frame_len = item.payload.len() + 1;
        if frame_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of length {frame_len} exceeds the {MAX_FRAME_LEN} byte limit"),
            ));
        }
        dst.reserve(4 + frame_len);
        dst.put_u32(frame_len as u32);
        dst.put_u8(item.id as u8);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) -> Message {
        let mut framer = MessageFramer;
        let mut buf = BytesMut::new();
        framer.encode(msg, &mut buf).unwrap();
        framer.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn encodes_and_decodes_request() {
        let msg = Message::request(3, 16384, 16384);
        let decoded = roundtrip(msg);
        assert_eq!(decoded.id, MessageId::Request);
        assert_eq!(decoded.payload.len(), 12);
    }

    #[test]
    fn keep_alive_is_swallowed() {
        let mut framer = MessageFramer;
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        assert!(framer.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut framer = MessageFramer;
        let mut buf = BytesMut::from(&[0u8, 0, 0, 5, 2][..]);
        assert!(framer.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn unknown_message_id_is_an_error() {
        let mut framer = MessageFramer;
        let mut buf = BytesMut::from(&[0u8, 0, 0, 1, 9][..]);
        assert!(framer.decode(&mut buf).is_err());
    }

    #[test]
    fn oversize_frame_is_rejected() {
        let mut framer = MessageFramer;
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_LEN + 1) as u32);
        assert!(framer.decode(&mut buf).is_err());
    }

    #[test]
    fn parse_piece_extracts_fields() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&7u32.to_be_bytes());
        payload.extend_from_slice(&16384u32.to_be_bytes());
        payload.extend_from_slice(&[1, 2, 3]);
        let msg = Message::new(MessageId::Piece, payload);
        let (index, begin, block) = msg.parse_piece().unwrap();
        assert_eq!(index, 7);
        assert_eq!(begin, 16384);
        assert_eq!(block, &[1, 2, 3]);
    }
}
