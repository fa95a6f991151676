//! Concurrent piece scheduler (`spec.md` §4.F).
//!
//! Grounded on `muhtutorials-bittorrent`'s `download::all`, restructured
//! from block-level `FuturesUnordered` racing within a single piece to
//! whole-piece dispatch across pieces: one `tokio::spawn`ed task per piece,
//! each task claiming whichever available [`PeerSession`] holds that piece
//! via a non-reentrant [`tokio::sync::Mutex`] `try_lock`, and a shared
//! [`tokio::sync::Notify`] standing in for "a new piece just became
//! available" since peer connections complete at different times.

use crate::error::SchedulerError;
use crate::metainfo::Metainfo;
use crate::piece::PieceInfo;
use crate::session::PeerSession;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

/// How many peer connections we attempt concurrently and keep open
/// (`spec.md` §4.F's recommended swarm size).
const MAX_PEERS: usize = 30;
const CONNECT_CONCURRENCY: usize = 10;

struct Swarm {
    sessions: Vec<Arc<Mutex<PeerSession>>>,
    /// Which session indices are known to hold each piece. Populated as
    /// connections succeed, since the full swarm rarely finishes connecting
    /// before the first pieces are ready to download.
    piece_to_peers: Mutex<HashMap<usize, Vec<usize>>>,
    availability: Notify,
}

impl Swarm {
    async fn connect(
        metainfo: &Metainfo,
        peer_addrs: Vec<SocketAddrV4>,
        our_peer_id: [u8; 20],
    ) -> Result<Arc<Self>, SchedulerError> {
        if peer_addrs.is_empty() {
            return Err(SchedulerError::NoPeers);
        }

        let num_pieces = metainfo.num_pieces();
        let info_hash = metainfo.info_hash();
        let mut connected = stream::iter(peer_addrs.into_iter())
            .map(|addr| async move {
                let result = PeerSession::connect(addr, info_hash, our_peer_id, num_pieces).await;
                (addr, result)
            })
            .buffer_unordered(CONNECT_CONCURRENCY);

        // `sessions` is populated before any task observes it, so build it
        // locally and only publish the finished `Swarm` once.
        let mut sessions = Vec::new();
        let mut piece_to_peers: HashMap<usize, Vec<usize>> = HashMap::new();
        while let Some((addr, result)) = connected.next().await {
            match result {
                Ok(session) => {
                    let session_i = sessions.len();
                    for piece_index in 0..num_pieces {
                        if session.has_piece(piece_index) {
                            piece_to_peers.entry(piece_index).or_default().push(session_i);
                        }
                    }
                    sessions.push(Arc::new(Mutex::new(session)));
                    if sessions.len() >= MAX_PEERS {
                        break;
                    }
                }
                Err(err) => warn!(%addr, %err, "failed to connect to peer"),
            }
        }

        if sessions.is_empty() {
            return Err(SchedulerError::NoPeers);
        }

        Ok(Arc::new(Self {
            sessions,
            piece_to_peers: Mutex::new(piece_to_peers),
            availability: Notify::new(),
        }))
    }

    /// Removes `session_i` as a known holder of `piece_index`, e.g. after it
    /// produced corrupt data or dropped the connection.
    async fn disqualify(&self, piece_index: usize, session_i: usize) {
        let mut map = self.piece_to_peers.lock().await;
        if let Some(holders) = map.get_mut(&piece_index) {
            holders.retain(|&i| i != session_i);
        }
    }
}

/// Downloads every piece of `metainfo` from `peer_addrs`, verifying each
/// against its expected SHA-1, and returns `(index, bytes)` pairs in
/// arbitrary completion order for [`crate::assembler`] to sort out.
pub async fn download_all(
    metainfo: &Metainfo,
    peer_addrs: Vec<SocketAddrV4>,
    our_peer_id: [u8; 20],
) -> Result<Vec<(usize, Bytes)>, SchedulerError> {
    let swarm = Swarm::connect(metainfo, peer_addrs, our_peer_id).await?;
    info!(peers = swarm.sessions.len(), "connected to swarm");

    let pieces = PieceInfo::all(metainfo);
    let tasks: Vec<_> = pieces
        .into_iter()
        .map(|piece| {
            let swarm = Arc::clone(&swarm);
            tokio::spawn(async move { download_one_piece(&swarm, piece).await })
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        let (index, bytes) = task
            .await
            .expect("piece download task panicked")?;
        results.push((index, bytes));
    }
    Ok(results)
}

async fn download_one_piece(
    swarm: &Swarm,
    piece: PieceInfo,
) -> Result<(usize, Bytes), SchedulerError> {
    let mut excluded: Vec<usize> = Vec::new();
    let mut any_integrity_failure = false;
    loop {
        // `piece_to_peers` only ever shrinks after the initial connect phase
        // (no new peers join mid-download), so once no holder remains for
        // this piece outside `excluded`, none ever will — fail fast instead
        // of waiting on a signal nothing will send for this piece again.
        let Some(session_i) = pick_session(swarm, piece.index, &excluded).await else {
            return if any_integrity_failure {
                Err(SchedulerError::IntegrityExhausted(piece.index))
            } else {
                Err(SchedulerError::PieceUnavailable(piece.index))
            };
        };

        let session = Arc::clone(&swarm.sessions[session_i]);
        // try_lock makes busy sessions skip this piece instead of queueing
        // behind them, per `spec.md` §4.F; wait for `availability` rather
        // than busy-spinning until some session frees up.
        let Ok(mut guard) = session.try_lock() else {
            swarm.availability.notified().await;
            continue;
        };

        let addr = guard.addr();
        let outcome = guard.download_piece(piece).await;
        drop(guard);
        swarm.availability.notify_waiters();

        match outcome {
            Ok(bytes) if sha1_matches(&bytes, &piece.hash) => {
                return Ok((piece.index, Bytes::from(bytes)));
            }
            Ok(_) => {
                warn!(piece = piece.index, %addr, "piece failed integrity check");
                any_integrity_failure = true;
                swarm.disqualify(piece.index, session_i).await;
                excluded.push(session_i);
            }
            Err(err) => {
                warn!(piece = piece.index, %addr, %err, "peer failed mid-download");
                swarm.disqualify(piece.index, session_i).await;
                excluded.push(session_i);
            }
        }
    }
}

async fn pick_session(swarm: &Swarm, piece_index: usize, excluded: &[usize]) -> Option<usize> {
    let map = swarm.piece_to_peers.lock().await;
    map.get(&piece_index)?
        .iter()
        .find(|i| !excluded.contains(i))
        .copied()
}

fn sha1_matches(bytes: &[u8], expected: &[u8; 20]) -> bool {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let hash: [u8; 20] = hasher.finalize().into();
    hash == *expected
}
