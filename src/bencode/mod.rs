//! Bencode codec: the BitTorrent metadata encoding.
//!
//! `Value` is a closed sum over the four bencode shapes. Decoding is strict
//! by default (dict keys must be strictly increasing raw-byte order, no
//! leading zeros on integers); [`decode_tolerant`] relaxes only the
//! dict-key-ordering check, for tracker responses that aren't guaranteed
//! canonical.
use std::collections::BTreeMap;

mod decode;
mod encode;
mod error;

pub use decode::{decode, decode_full, decode_tolerant};
pub use encode::encode;
pub use error::DecodeError;

/// A decoded bencode value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    ByteString(Vec<u8>),
    Integer(i64),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?.get(key.as_bytes())
    }

    pub fn string(s: impl Into<Vec<u8>>) -> Self {
        Value::ByteString(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S1
    #[test]
    fn decode_byte_string() {
        let (v, rest) = decode(b"5:hello").unwrap();
        assert_eq!(v, Value::ByteString(b"hello".to_vec()));
        assert_eq!(rest, 7);
    }

    // S2
    #[test]
    fn decode_negative_integer() {
        let (v, _) = decode(b"i-100e").unwrap();
        assert_eq!(v, Value::Integer(-100));
    }

    // S3
    #[test]
    fn decode_nested_list() {
        let (v, _) = decode(b"lli777e4:pearee").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::List(vec![
                Value::Integer(777),
                Value::ByteString(b"pear".to_vec()),
            ])])
        );
    }

    // S4
    #[test]
    fn decode_dict() {
        let (v, _) = decode(b"d3:foo3:bar5:helloi52ee").unwrap();
        let mut expected = BTreeMap::new();
        expected.insert(b"foo".to_vec(), Value::ByteString(b"bar".to_vec()));
        expected.insert(b"hello".to_vec(), Value::Integer(52));
        assert_eq!(v, Value::Dict(expected));
    }

    // S5
    #[test]
    fn encode_dict_sorts_keys() {
        let mut m = BTreeMap::new();
        m.insert(b"name".to_vec(), Value::string("alice"));
        m.insert(b"age".to_vec(), Value::Integer(25));
        let v = Value::Dict(m);
        assert_eq!(encode(&v), b"d3:agei25e4:name5:alicee".to_vec());
    }

    #[test]
    fn round_trip_property() {
        let values = vec![
            Value::ByteString(vec![]),
            Value::ByteString(vec![0, 1, 2, 255]),
            Value::Integer(0),
            Value::Integer(-1),
            Value::Integer(i64::MAX),
            Value::List(vec![Value::Integer(1), Value::string("x")]),
        ];
        for v in values {
            let bytes = encode(&v);
            let (decoded, consumed) = decode(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn canonical_round_trip_property() {
        // property 2: encode(decode(b)) == b for canonical b
        for canonical in [
            &b"5:hello"[..],
            b"i-100e",
            b"lli777e4:pearee",
            b"d3:foo3:bar5:helloi52ee",
        ] {
            let (v, consumed) = decode(canonical).unwrap();
            assert_eq!(consumed, canonical.len());
            assert_eq!(encode(&v), canonical);
        }
    }

    #[test]
    fn rejects_unsorted_dict_keys() {
        // "hello" before "foo" is out of lexicographic order
        assert!(decode(b"d5:helloi52e3:foo3:bare").is_err());
    }

    #[test]
    fn rejects_leading_zero_integer() {
        assert!(decode(b"i04e").is_err());
    }

    #[test]
    fn rejects_negative_zero() {
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn rejects_non_string_dict_key() {
        assert!(decode(b"di1ei2ee").is_err());
    }

    #[test]
    fn rejects_truncated_string() {
        assert!(decode(b"10:short").is_err());
    }

    #[test]
    fn decode_full_rejects_trailing_bytes() {
        assert!(decode_full(b"5:helloextra").is_err());
        assert!(decode_full(b"5:hello").is_ok());
    }

    #[test]
    fn decode_tolerant_allows_unsorted_keys() {
        let bytes = b"d5:helloi52e3:foo3:bare";
        assert!(decode(bytes).is_err());
        let (v, _) = decode_tolerant(bytes).unwrap();
        assert_eq!(v.get("foo").unwrap().as_bytes(), Some(&b"bar"[..]));
        assert_eq!(v.get("hello").unwrap().as_integer(), Some(52));
    }
}
