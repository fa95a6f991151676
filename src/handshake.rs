//! The fixed 68-byte peer handshake (`spec.md` §4.E).
//!
//! Grounded on `devharshthakur-rs-torrent-client`'s `peer/handshake.rs`: a
//! safe byte-slice serialization rather than the teacher
//! (`muhtutorials-bittorrent`)'s `#[repr(C)]` + raw-pointer-cast approach.

use crate::error::PeerError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    fn to_bytes(&self) -> [u8; 68] {
        let mut buf = [0u8; 68];
        buf[0] = 19;
        buf[1..20].copy_from_slice(PROTOCOL);
        // buf[20..28] reserved, left as zero.
        buf[28..48].copy_from_slice(&self.info_hash);
        buf[48..68].copy_from_slice(&self.peer_id);
        buf
    }

    fn from_bytes(buf: &[u8; 68]) -> Result<Self, PeerError> {
        if buf[0] != 19 || &buf[1..20] != PROTOCOL {
            return Err(PeerError::InvalidHandshake);
        }
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&buf[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&buf[48..68]);
        Ok(Self { info_hash, peer_id })
    }

    /// Sends our handshake first, then reads and validates the peer's reply,
    /// per the symmetric exchange in `spec.md` §4.E.
    pub async fn exchange(
        stream: &mut TcpStream,
        info_hash: [u8; 20],
        peer_id: [u8; 20],
    ) -> Result<Handshake, PeerError> {
        let ours = Handshake::new(info_hash, peer_id);
        stream.write_all(&ours.to_bytes()).await?;
        let mut buf = [0u8; 68];
        stream.read_exact(&mut buf).await?;
        let theirs = Handshake::from_bytes(&buf)?;
        if theirs.info_hash != info_hash {
            return Err(PeerError::InfoHashMismatch);
        }
        Ok(theirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let hs = Handshake::new([1; 20], [2; 20]);
        let bytes = hs.to_bytes();
        let decoded = Handshake::from_bytes(&bytes).unwrap();
        assert_eq!(hs, decoded);
    }

    #[test]
    fn rejects_wrong_protocol_string() {
        let mut buf = Handshake::new([0; 20], [0; 20]).to_bytes();
        buf[1] = b'X';
        assert!(Handshake::from_bytes(&buf).is_err());
    }

    #[test]
    fn rejects_wrong_length_byte() {
        let mut buf = Handshake::new([0; 20], [0; 20]).to_bytes();
        buf[0] = 20;
        assert!(Handshake::from_bytes(&buf).is_err());
    }
}
