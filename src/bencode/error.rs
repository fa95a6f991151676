use thiserror::Error;

/// A bencode decode failure, with the byte offset it was detected at.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("missing ':' delimiter for byte string length at offset {offset}")]
    MissingDelimiter { offset: usize },

    #[error("bad length prefix at offset {offset}: {reason}")]
    BadLength { offset: usize, reason: String },

    #[error("truncated byte string at offset {offset}: expected {expected} bytes, got {got}")]
    TruncatedString {
        offset: usize,
        expected: usize,
        got: usize,
    },

    #[error("malformed integer at offset {offset}: {reason}")]
    MalformedInteger { offset: usize, reason: String },

    #[error("dictionary key is not a byte string at offset {offset}")]
    NonStringDictKey { offset: usize },

    #[error("dictionary keys out of order at offset {offset}: {reason}")]
    UnsortedDictKeys { offset: usize, reason: String },

    #[error("unexpected byte {byte:#04x} at offset {offset}")]
    UnexpectedByte { offset: usize, byte: u8 },

    #[error("trailing bytes after top-level value, starting at offset {offset}")]
    TrailingBytes { offset: usize },
}
