//! Piece identity: index, size and expected SHA-1 (`spec.md` §3).
//!
//! Grounded on `muhtutorials-bittorrent`'s `piece.rs`, simplified: rarity
//! (fewest-holders-first ordering) now lives in [`crate::scheduler`], since
//! availability is swarm state that changes as peers fail, not a property
//! fixed at piece construction time.

use crate::metainfo::Metainfo;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PieceInfo {
    pub index: usize,
    pub length: u64,
    pub hash: [u8; 20],
}

impl PieceInfo {
    pub fn new(index: usize, metainfo: &Metainfo) -> Option<Self> {
        let hash = metainfo.expected_hash(index)?;
        Some(Self {
            index,
            length: metainfo.piece_length_for(index),
            hash,
        })
    }

    pub fn all(metainfo: &Metainfo) -> Vec<PieceInfo> {
        (0..metainfo.num_pieces())
            .map(|i| PieceInfo::new(i, metainfo).expect("index within num_pieces"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{self, Value};
    use std::collections::BTreeMap;

    fn metainfo(length: i64, piece_length: i64, num_pieces: usize) -> Metainfo {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(length));
        info.insert(b"name".to_vec(), Value::string("f"));
        info.insert(b"piece length".to_vec(), Value::Integer(piece_length));
        info.insert(
            b"pieces".to_vec(),
            Value::ByteString(vec![0u8; 20 * num_pieces]),
        );
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), Value::string("http://t"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        let bytes = bencode::encode(&Value::Dict(root));
        Metainfo::parse(&bytes).unwrap()
    }

    #[test]
    fn last_piece_is_shorter() {
        let m = metainfo(25, 10, 3);
        let pieces = PieceInfo::all(&m);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].length, 10);
        assert_eq!(pieces[1].length, 10);
        assert_eq!(pieces[2].length, 5);
    }
}
