//! Tracker client: builds the GET request and parses the compact peer list
//! (`spec.md` §4.C).
//!
//! Grounded on `muhtutorials-bittorrent`'s `tracker.rs` for the overall
//! shape, rewired onto the hand-rolled bencode codec instead of
//! `serde_bencode`, and on `devharshthakur-rs-torrent-client`'s
//! `tracker/mod.rs` for peer-id generation and percent-encoding style.

use crate::bencode::{self, Value};
use crate::error::TrackerError;
use rand::Rng;
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

const DEFAULT_PORT: u16 = 6881;

/// Generates a fresh 20-byte peer id: an 8-byte client tag followed by 12
/// random bytes, in the convention `devharshthakur-rs-torrent-client` uses.
pub fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = [0u8; 20];
    peer_id[..8].copy_from_slice(b"-RS0001-");
    rand::rng().fill(&mut peer_id[8..]);
    peer_id
}

#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    pub interval: u64,
    pub peers: Vec<SocketAddrV4>,
}

/// Issues the GET request of `spec.md` §4.C against `announce_url` and
/// parses the compact peer list from the response.
pub async fn announce(
    announce_url: &str,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    left: u64,
    port: u16,
) -> Result<AnnounceResponse, TrackerError> {
    let mut url = url::Url::parse(announce_url)
        .map_err(|_| TrackerError::MalformedField("announce"))?;
    url.query_pairs_mut()
        .append_pair("port", &port.to_string())
        .append_pair("uploaded", "0")
        .append_pair("downloaded", "0")
        .append_pair("left", &left.to_string())
        .append_pair("compact", "1");
    let mut url = url.to_string();
    url.push_str(&format!(
        "&info_hash={}&peer_id={}",
        url_encode(&info_hash),
        url_encode(&peer_id)
    ));

    debug!(%url, "querying tracker");
    let response = reqwest::get(&url).await?;
    let bytes = response.bytes().await?;
    parse_response(&bytes)
}

fn parse_response(bytes: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = bencode::decode_tolerant(bytes)?.0;

    if let Some(reason) = value.get("failure reason").and_then(Value::as_bytes) {
        return Err(TrackerError::Failure(
            String::from_utf8_lossy(reason).into_owned(),
        ));
    }

    let interval = value
        .get("interval")
        .and_then(Value::as_integer)
        .ok_or(TrackerError::MalformedField("interval"))? as u64;

    let peers_bytes = value
        .get("peers")
        .and_then(Value::as_bytes)
        .ok_or(TrackerError::MalformedField("peers"))?;
    if peers_bytes.len() % 6 != 0 {
        return Err(TrackerError::InvalidPeerListLength(peers_bytes.len()));
    }

    // Dedup repeated (ip, port) pairs, per `spec.md` §4.C.
    let mut seen = BTreeSet::new();
    let mut peers = Vec::new();
    for chunk in peers_bytes.chunks_exact(6) {
        let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
        let port = u16::from_be_bytes([chunk[4], chunk[5]]);
        let addr = SocketAddrV4::new(ip, port);
        if seen.insert(addr) {
            peers.push(addr);
        }
    }

    Ok(AnnounceResponse { interval, peers })
}

/// Percent-encodes bytes per RFC 3986, leaving unreserved characters as-is.
pub fn url_encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for &byte in bytes {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// The default port advertised in tracker requests (`spec.md` §4.C).
pub fn default_port() -> u16 {
    DEFAULT_PORT
}
