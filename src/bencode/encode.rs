use super::Value;

/// Encodes a value into its canonical bencode byte representation.
///
/// Dictionary keys are emitted in raw-byte lexicographic order (guaranteed
/// here since `Value::Dict` is backed by a `BTreeMap<Vec<u8>, Value>`).
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::ByteString(bytes) => {
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(bytes);
        }
        Value::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            for (key, val) in map {
                encode_into(&Value::ByteString(key.clone()), out);
                encode_into(val, out);
            }
            out.push(b'e');
        }
    }
}
