//! Per-connection peer state machine (`spec.md` §4.E).
//!
//! Grounded on `muhtutorials-bittorrent`'s `peer.rs` `Peer`, restructured
//! around whole-piece requests instead of the teacher's block-level,
//! multi-peer cooperative download: `spec.md` §4.E/§4.F specify "at most one
//! in-flight piece request per session" and a scheduler that dispatches one
//! piece per task, not several peers racing for blocks of the same piece.

use crate::bitfield::Bitfield;
use crate::error::PeerError;
use crate::handshake::Handshake;
use crate::piece::PieceInfo;
use crate::wire::{BLOCK_SIZE, Message, MessageFramer, MessageId};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Recommended default socket read timeout (`spec.md` §5).
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PeerSession {
    addr: SocketAddrV4,
    framed: Framed<TcpStream, MessageFramer>,
    remote_peer_id: [u8; 20],
    bitfield: Bitfield,
    peer_choking_us: bool,
    we_interested: bool,
}

impl PeerSession {
    /// Drives `NEW → AWAIT_HS → AWAIT_BITFIELD → IDLE_CHOKED`: connects,
    /// exchanges handshakes, and collects the peer's bitfield (treating a
    /// missing one as all-zeros with a warning, per `spec.md` §4.E).
    pub async fn connect(
        addr: SocketAddrV4,
        info_hash: [u8; 20],
        peer_id: [u8; 20],
        num_pieces: usize,
    ) -> Result<Self, PeerError> {
        let mut stream = TcpStream::connect(addr).await?;
        let handshake = Handshake::exchange(&mut stream, info_hash, peer_id).await?;
        let mut framed = Framed::new(stream, MessageFramer);

        let bitfield = match timeout(READ_TIMEOUT, framed.next()).await {
            Ok(Some(Ok(msg))) if msg.id == MessageId::Bitfield => {
                Bitfield::from_payload(msg.payload, num_pieces)
            }
            Ok(Some(Ok(_))) => {
                warn!(%addr, "peer sent a non-bitfield message first; treating as empty");
                Bitfield::empty(num_pieces)
            }
            Ok(Some(Err(err))) => return Err(err.into()),
            Ok(None) | Err(_) => {
                warn!(%addr, "peer did not send a bitfield; treating as empty");
                Bitfield::empty(num_pieces)
            }
        };

        Ok(Self {
            addr,
            framed,
            remote_peer_id: handshake.peer_id,
            bitfield,
            peer_choking_us: true,
            we_interested: false,
        })
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn remote_peer_id(&self) -> [u8; 20] {
        self.remote_peer_id
    }

    pub fn has_piece(&self, index: usize) -> bool {
        self.bitfield.has_piece(index)
    }

    async fn next_message(&mut self) -> Result<Message, PeerError> {
        match timeout(READ_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(msg))) => Ok(msg),
            Ok(Some(Err(err))) => Err(err.into()),
            Ok(None) => Err(PeerError::ConnectionClosed),
            Err(_) => Err(PeerError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "peer socket read timed out",
            ))),
        }
    }

    fn observe_passively(&mut self, msg: &Message) {
        if msg.id == MessageId::Have && msg.payload.len() == 4 {
            let index = u32::from_be_bytes(msg.payload[..4].try_into().unwrap());
            self.bitfield.set_piece(index as usize);
        }
    }

    /// `IDLE_CHOKED → AWAIT_UNCHOKE → READY`. Sends `interested` at most
    /// once per session (`spec.md` §9's rejected "resend every piece" bug).
    async fn ensure_interested(&mut self) -> Result<(), PeerError> {
        if !self.we_interested {
            self.framed.send(Message::interested()).await?;
            self.we_interested = true;
            debug!(addr = %self.addr, "sent interested");
        }
        while self.peer_choking_us {
            let msg = self.next_message().await?;
            match msg.id {
                MessageId::Unchoke => self.peer_choking_us = false,
                MessageId::Choke => self.peer_choking_us = true,
                other => {
                    self.observe_passively(&msg);
                    debug!(addr = %self.addr, ?other, "ignoring message while awaiting unchoke");
                }
            }
        }
        Ok(())
    }

    /// `READY → AWAIT_PIECE → READY` for a single block, reissuing the
    /// request if the peer chokes us mid-flight (`spec.md` §4.E).
    async fn request_block(
        &mut self,
        index: u32,
        begin: u32,
        length: u32,
    ) -> Result<Vec<u8>, PeerError> {
        self.framed
            .send(Message::request(index, begin, length))
            .await?;
        loop {
            let msg = self.next_message().await?;
            match msg.id {
                MessageId::Choke => {
                    self.peer_choking_us = true;
                    self.ensure_interested().await?;
                    self.framed
                        .send(Message::request(index, begin, length))
                        .await?;
                }
                MessageId::Piece => {
                    let (got_index, got_begin, block) = msg.parse_piece()?;
                    if got_index != index || got_begin != begin {
                        return Err(PeerError::PieceEchoMismatch {
                            want_index: index,
                            want_begin: begin,
                            got_index,
                            got_begin,
                        });
                    }
                    return Ok(block.to_vec());
                }
                other => {
                    self.observe_passively(&msg);
                    debug!(addr = %self.addr, ?other, "ignoring message while awaiting piece");
                }
            }
        }
    }

    /// Downloads and returns one whole piece's bytes, left-to-right in
    /// `BLOCK_SIZE` chunks (`spec.md` §4.E block sizing). Does not verify
    /// the hash; that's the scheduler's job (`spec.md` §4.F).
    pub async fn download_piece(&mut self, piece: PieceInfo) -> Result<Vec<u8>, PeerError> {
        self.ensure_interested().await?;
        let mut buf = vec![0u8; piece.length as usize];
        let mut begin: u64 = 0;
        while begin < piece.length {
            let remaining = piece.length - begin;
            let block_len = remaining.min(BLOCK_SIZE as u64) as u32;
            let block = self
                .request_block(piece.index as u32, begin as u32, block_len)
                .await?;
            if block.len() as u32 != block_len {
                return Err(PeerError::UnexpectedMessage);
            }
            buf[begin as usize..begin as usize + block.len()].copy_from_slice(&block);
            begin += block.len() as u64;
        }
        Ok(buf)
    }
}
