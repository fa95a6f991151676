//! Typed view over a decoded `.torrent` dictionary (`spec.md` §3/§4.B).
//!
//! Grounded on `devharshthakur-rs-torrent-client`'s `torrent::{file,
//! info_hash}` for the typed-accessor shape, built on the hand-rolled
//! bencode codec instead of `serde_bencode` so unknown keys (`created by`,
//! `creation date`, ...) are tolerated and preserved through the info-hash
//! round-trip for free — they simply stay as unread `Value::Dict` entries.

use crate::bencode::{self, Value};
use crate::error::MetainfoError;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone)]
pub struct Metainfo {
    pub announce: String,
    pub name: String,
    pub length: u64,
    pub piece_length: u64,
    pub piece_hashes: Vec<[u8; 20]>,
    info_hash: [u8; 20],
}

impl Metainfo {
    /// Parses a raw `.torrent` file's bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, MetainfoError> {
        let root = bencode::decode_full(bytes)?;
        Self::from_value(&root)
    }

    fn from_value(root: &Value) -> Result<Self, MetainfoError> {
        let announce = required_string(root, "announce")?;
        let info = root
            .get("info")
            .ok_or(MetainfoError::MissingKey("info"))?;

        let name = required_string(info, "name")?;
        let piece_length = required_integer(info, "piece length")?;
        if piece_length <= 0 {
            return Err(MetainfoError::NonPositivePieceLength);
        }
        let length = required_integer(info, "length")?;
        if length < 0 {
            return Err(MetainfoError::NegativeLength);
        }
        let pieces = info
            .get("pieces")
            .and_then(Value::as_bytes)
            .ok_or(MetainfoError::MissingKey("pieces"))?;
        if pieces.len() % 20 != 0 {
            return Err(MetainfoError::InvalidPiecesLength(pieces.len()));
        }
        let piece_hashes: Vec<[u8; 20]> = pieces
            .chunks_exact(20)
            .map(|chunk| chunk.try_into().expect("chunk is exactly 20 bytes"))
            .collect();

        let expected_pieces = (length as u64).div_ceil(piece_length as u64);
        if piece_hashes.len() as u64 != expected_pieces {
            return Err(MetainfoError::InconsistentPieceCount {
                expected: expected_pieces,
                actual: piece_hashes.len(),
            });
        }

        let info_hash = Self::hash_info(info);

        Ok(Self {
            announce,
            name,
            length: length as u64,
            piece_length: piece_length as u64,
            piece_hashes,
            info_hash,
        })
    }

    fn hash_info(info: &Value) -> [u8; 20] {
        let encoded = bencode::encode(info);
        let mut hasher = Sha1::new();
        hasher.update(&encoded);
        hasher.finalize().into()
    }

    pub fn info_hash(&self) -> [u8; 20] {
        self.info_hash
    }

    /// Number of pieces, per `spec.md` §3: `ceil(length / piece_length)`.
    pub fn num_pieces(&self) -> usize {
        self.piece_hashes.len()
    }

    /// Size of piece `index`: `piece_length` for all but possibly the last
    /// piece. Resolves the "open question" of `spec.md` §9: the last-piece
    /// remainder term is used whenever it is *strictly greater than zero*,
    /// not merely greater than one.
    pub fn piece_length_for(&self, index: usize) -> u64 {
        let is_last = index + 1 == self.num_pieces();
        if is_last {
            let remainder = self.length % self.piece_length;
            if remainder > 0 {
                remainder
            } else {
                self.piece_length
            }
        } else {
            self.piece_length
        }
    }

    pub fn expected_hash(&self, index: usize) -> Option<[u8; 20]> {
        self.piece_hashes.get(index).copied()
    }
}

fn required_string(value: &Value, key: &'static str) -> Result<String, MetainfoError> {
    let bytes = value
        .get(key)
        .and_then(Value::as_bytes)
        .ok_or(MetainfoError::MissingKey(key))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn required_integer(value: &Value, key: &'static str) -> Result<i64, MetainfoError> {
    value
        .get(key)
        .and_then(Value::as_integer)
        .ok_or(MetainfoError::WrongType(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_bytes() -> Vec<u8> {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(12345));
        info.insert(b"name".to_vec(), Value::string("x"));
        info.insert(b"piece length".to_vec(), Value::Integer(16384));
        info.insert(b"pieces".to_vec(), Value::ByteString(vec![7u8; 20]));
        let mut root = BTreeMap::new();
        root.insert(
            b"announce".to_vec(),
            Value::string("http://tracker.example/announce"),
        );
        root.insert(b"info".to_vec(), Value::Dict(info));
        bencode::encode(&Value::Dict(root))
    }

    // S6
    #[test]
    fn info_hash_matches_manual_bencoding() {
        let metainfo = Metainfo::parse(&sample_bytes()).unwrap();
        let expected = format!(
            "d6:lengthi12345e4:name1:x12:piece lengthi16384e6:pieces20:{}e",
            "\u{7}".repeat(20)
        );
        let mut hasher = Sha1::new();
        hasher.update(expected.as_bytes());
        let expected_hash: [u8; 20] = hasher.finalize().into();
        assert_eq!(metainfo.info_hash(), expected_hash);
    }

    #[test]
    fn info_hash_is_stable_across_reencoding() {
        let metainfo = Metainfo::parse(&sample_bytes()).unwrap();
        let hash_again = Metainfo::parse(&sample_bytes()).unwrap().info_hash();
        assert_eq!(metainfo.info_hash(), hash_again);
    }

    #[test]
    fn piece_count_and_sizes() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(25));
        info.insert(b"name".to_vec(), Value::string("f"));
        info.insert(b"piece length".to_vec(), Value::Integer(10));
        info.insert(b"pieces".to_vec(), Value::ByteString(vec![0u8; 60]));
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), Value::string("http://t"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        let bytes = bencode::encode(&Value::Dict(root));
        let metainfo = Metainfo::parse(&bytes).unwrap();

        assert_eq!(metainfo.num_pieces(), 3);
        let total: u64 = (0..metainfo.num_pieces())
            .map(|i| metainfo.piece_length_for(i))
            .sum();
        assert_eq!(total, 25);
        assert_eq!(metainfo.piece_length_for(2), 5);
    }

    #[test]
    fn exact_multiple_last_piece_is_full_length() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(20));
        info.insert(b"name".to_vec(), Value::string("f"));
        info.insert(b"piece length".to_vec(), Value::Integer(10));
        info.insert(b"pieces".to_vec(), Value::ByteString(vec![0u8; 40]));
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), Value::string("http://t"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        let bytes = bencode::encode(&Value::Dict(root));
        let metainfo = Metainfo::parse(&bytes).unwrap();
        assert_eq!(metainfo.num_pieces(), 2);
        assert_eq!(metainfo.piece_length_for(1), 10);
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(1));
        info.insert(b"name".to_vec(), Value::string("x"));
        info.insert(b"piece length".to_vec(), Value::Integer(1));
        info.insert(b"pieces".to_vec(), Value::ByteString(vec![0u8; 20]));
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), Value::string("http://t"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        root.insert(b"created by".to_vec(), Value::string("some client"));
        let bytes = bencode::encode(&Value::Dict(root));
        assert!(Metainfo::parse(&bytes).is_ok());
    }

    #[test]
    fn rejects_pieces_length_not_multiple_of_20() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(1));
        info.insert(b"name".to_vec(), Value::string("x"));
        info.insert(b"piece length".to_vec(), Value::Integer(1));
        info.insert(b"pieces".to_vec(), Value::ByteString(vec![0u8; 19]));
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), Value::string("http://t"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        let bytes = bencode::encode(&Value::Dict(root));
        assert!(matches!(
            Metainfo::parse(&bytes),
            Err(MetainfoError::InvalidPiecesLength(19))
        ));
    }

    // S5
    #[test]
    fn rejects_piece_count_inconsistent_with_length() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Value::Integer(100));
        info.insert(b"name".to_vec(), Value::string("x"));
        info.insert(b"piece length".to_vec(), Value::Integer(10));
        // `length`/`piece length` imply 10 pieces; only 3 hashes are present.
        info.insert(b"pieces".to_vec(), Value::ByteString(vec![0u8; 60]));
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), Value::string("http://t"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        let bytes = bencode::encode(&Value::Dict(root));
        assert!(matches!(
            Metainfo::parse(&bytes),
            Err(MetainfoError::InconsistentPieceCount {
                expected: 10,
                actual: 3
            })
        ));
    }
}
