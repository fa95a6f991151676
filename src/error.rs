//! Crate-level error taxonomy (`spec.md` §7), aggregating each component's
//! `thiserror` enum. Grounded on `devharshthakur-rs-torrent-client`'s
//! `torrent::TorrentError`.

use thiserror::Error;

pub use crate::bencode::DecodeError as BencodeError;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("bencode decode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("missing required key {0:?}")]
    MissingKey(&'static str),

    #[error("key {0:?} has the wrong type")]
    WrongType(&'static str),

    #[error("`pieces` length {0} is not a multiple of 20")]
    InvalidPiecesLength(usize),

    #[error("`piece length` must be positive")]
    NonPositivePieceLength,

    #[error("`length` must be non-negative")]
    NegativeLength,

    #[error(
        "`pieces` holds {actual} piece hashes but `length`/`piece length` imply {expected}"
    )]
    InconsistentPieceCount { expected: u64, actual: usize },
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker response was not valid bencode: {0}")]
    Bencode(#[from] BencodeError),

    #[error("tracker returned a failure reason: {0}")]
    Failure(String),

    #[error("tracker response is missing or has a malformed {0:?} field")]
    MalformedField(&'static str),

    #[error("compact peer list length {0} is not a multiple of 6")]
    InvalidPeerListLength(usize),
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake protocol identifier did not match")]
    InvalidHandshake,

    #[error("handshake info-hash did not match ours")]
    InfoHashMismatch,

    #[error("peer closed the connection before sending a bitfield")]
    MissingBitfield,

    #[error("peer sent a bitfield after the handshake phase")]
    UnexpectedBitfield,

    #[error("peer's piece response echoed ({got_index}, {got_begin}) but we requested ({want_index}, {want_begin})")]
    PieceEchoMismatch {
        want_index: u32,
        want_begin: u32,
        got_index: u32,
        got_begin: u32,
    },

    #[error("peer sent an unexpected message for the current state")]
    UnexpectedMessage,

    #[error("connection closed before the expected reply arrived")]
    ConnectionClosed,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no peer holds piece {0}")]
    PieceUnavailable(usize),

    #[error("piece {0} failed its SHA-1 check after all available peers were tried")]
    IntegrityExhausted(usize),

    #[error("no peers were returned by the tracker")]
    NoPeers,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Metainfo(#[from] MetainfoError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
