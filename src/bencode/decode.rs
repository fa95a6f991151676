use super::Value;
use super::error::DecodeError;
use std::collections::BTreeMap;

/// Decodes one bencode value starting at the front of `input`.
///
/// Returns the value and the offset immediately past it; trailing bytes, if
/// any, are left unconsumed. Dictionary keys must be strictly increasing raw
/// byte order (the canonical-input requirement of `spec.md` §4.A).
pub fn decode(input: &[u8]) -> Result<(Value, usize), DecodeError> {
    decode_at(input, 0, false)
}

/// Like [`decode`], but requires the entire input to be consumed.
pub fn decode_full(input: &[u8]) -> Result<Value, DecodeError> {
    let (value, consumed) = decode(input)?;
    if consumed != input.len() {
        return Err(DecodeError::TrailingBytes { offset: consumed });
    }
    Ok(value)
}

/// Like [`decode`], but tolerates dictionaries whose keys are not in sorted
/// order (tracker responses are not guaranteed canonical).
pub fn decode_tolerant(input: &[u8]) -> Result<(Value, usize), DecodeError> {
    decode_at(input, 0, true)
}

fn decode_at(input: &[u8], offset: usize, tolerant: bool) -> Result<(Value, usize), DecodeError> {
    let byte = *input
        .get(offset)
        .ok_or(DecodeError::UnexpectedEof { offset })?;
    match byte {
        b'0'..=b'9' => decode_string(input, offset),
        b'i' => decode_integer(input, offset),
        b'l' => decode_list(input, offset, tolerant),
        b'd' => decode_dict(input, offset, tolerant),
        other => Err(DecodeError::UnexpectedByte {
            offset,
            byte: other,
        }),
    }
}

fn decode_string(input: &[u8], offset: usize) -> Result<(Value, usize), DecodeError> {
    let colon = find(input, offset, b':').ok_or(DecodeError::MissingDelimiter { offset })?;
    let len_bytes = &input[offset..colon];
    if len_bytes.is_empty() || (len_bytes.len() > 1 && len_bytes[0] == b'0') {
        return Err(DecodeError::BadLength {
            offset,
            reason: "length prefix must not be empty or have a leading zero".into(),
        });
    }
    let len_str = std::str::from_utf8(len_bytes).map_err(|_| DecodeError::BadLength {
        offset,
        reason: "length prefix is not ASCII".into(),
    })?;
    let len: usize = len_str.parse().map_err(|_| DecodeError::BadLength {
        offset,
        reason: format!("length prefix {len_str:?} is not a valid non-negative integer"),
    })?;
    let start = colon + 1;
    let end = start
        .checked_add(len)
        .ok_or(DecodeError::BadLength {
            offset,
            reason: "length overflows usize".into(),
        })?;
    if end > input.len() {
        return Err(DecodeError::TruncatedString {
            offset,
            expected: len,
            got: input.len() - start,
        });
    }
    Ok((Value::ByteString(input[start..end].to_vec()), end))
}

fn decode_integer(input: &[u8], offset: usize) -> Result<(Value, usize), DecodeError> {
    debug_assert_eq!(input[offset], b'i');
    let e = find(input, offset + 1, b'e').ok_or(DecodeError::MissingDelimiter { offset })?;
    let digits = &input[offset + 1..e];
    let text = std::str::from_utf8(digits).map_err(|_| DecodeError::MalformedInteger {
        offset,
        reason: "not ASCII".into(),
    })?;
    if text.is_empty() {
        return Err(DecodeError::MalformedInteger {
            offset,
            reason: "empty integer payload".into(),
        });
    }
    if text == "-0" {
        return Err(DecodeError::MalformedInteger {
            offset,
            reason: "-0 is not a valid bencode integer".into(),
        });
    }
    let digits_only = text.strip_prefix('-').unwrap_or(text);
    if digits_only.is_empty() || !digits_only.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::MalformedInteger {
            offset,
            reason: format!("{text:?} is not a valid integer"),
        });
    }
    if digits_only.len() > 1 && digits_only.starts_with('0') {
        return Err(DecodeError::MalformedInteger {
            offset,
            reason: "leading zeros are not allowed".into(),
        });
    }
    let value: i64 = text.parse().map_err(|_| DecodeError::MalformedInteger {
        offset,
        reason: format!("{text:?} does not fit in an i64"),
    })?;
    Ok((Value::Integer(value), e + 1))
}

fn decode_list(
    input: &[u8],
    offset: usize,
    tolerant: bool,
) -> Result<(Value, usize), DecodeError> {
    debug_assert_eq!(input[offset], b'l');
    let mut pos = offset + 1;
    let mut items = Vec::new();
    loop {
        let byte = *input
            .get(pos)
            .ok_or(DecodeError::UnexpectedEof { offset: pos })?;
        if byte == b'e' {
            pos += 1;
            break;
        }
        let (value, next) = decode_at(input, pos, tolerant)?;
        items.push(value);
        pos = next;
    }
    Ok((Value::List(items), pos))
}

fn decode_dict(
    input: &[u8],
    offset: usize,
    tolerant: bool,
) -> Result<(Value, usize), DecodeError> {
    debug_assert_eq!(input[offset], b'd');
    let mut pos = offset + 1;
    let mut map = BTreeMap::new();
    let mut last_key: Option<Vec<u8>> = None;
    loop {
        let byte = *input
            .get(pos)
            .ok_or(DecodeError::UnexpectedEof { offset: pos })?;
        if byte == b'e' {
            pos += 1;
            break;
        }
        if !byte.is_ascii_digit() {
            return Err(DecodeError::NonStringDictKey { offset: pos });
        }
        let (key_value, next) = decode_string(input, pos)?;
        let key = match key_value {
            Value::ByteString(k) => k,
            _ => unreachable!("decode_string always returns ByteString"),
        };
        if !tolerant {
            if let Some(prev) = &last_key {
                if &key <= prev {
                    return Err(DecodeError::UnsortedDictKeys {
                        offset: pos,
                        reason: format!(
                            "key {:?} does not follow previous key {:?} in strictly increasing order",
                            String::from_utf8_lossy(&key),
                            String::from_utf8_lossy(prev)
                        ),
                    });
                }
            }
        }
        pos = next;
        let (value, next) = decode_at(input, pos, tolerant)?;
        pos = next;
        last_key = Some(key.clone());
        map.insert(key, value);
    }
    Ok((Value::Dict(map), pos))
}

fn find(input: &[u8], from: usize, needle: u8) -> Option<usize> {
    input[from..]
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}
