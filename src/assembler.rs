//! Assembles verified pieces into the single output file (`spec.md` §4.G).
//!
//! Grounded on `muhtutorials-bittorrent`'s `download::Downloaded`/
//! `DownloadedIter`, simplified to a single file: this crate's non-goals
//! drop multi-file torrents, so there is no file-boundary bookkeeping left
//! to do, only ordering pieces and writing them out.

use crate::metainfo::Metainfo;
use bytes::Bytes;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Sorts `pieces` by index and writes them to `path` back to back.
///
/// `pieces` must contain exactly one entry per piece of `metainfo`, though
/// not necessarily in index order (the scheduler returns them in whatever
/// order they finish downloading).
pub async fn assemble(
    metainfo: &Metainfo,
    mut pieces: Vec<(usize, Bytes)>,
    path: impl AsRef<Path>,
) -> io::Result<()> {
    pieces.sort_unstable_by_key(|(index, _)| *index);
    debug_assert_eq!(pieces.len(), metainfo.num_pieces());

    let mut file = File::create(path).await?;
    for (_, bytes) in &pieces {
        file.write_all(bytes).await?;
    }
    file.flush().await?;
    Ok(())
}
