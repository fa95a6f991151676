use anyhow::{Context, bail};
use bittorrent::bencode::{self, Value};
use bittorrent::handshake::Handshake;
use bittorrent::metainfo::Metainfo;
use bittorrent::piece::PieceInfo;
use bittorrent::session::PeerSession;
use bittorrent::{assembler, scheduler, tracker};
use clap::{Parser, Subcommand};
use sha1::{Digest, Sha1};
use std::net::SocketAddrV4;
use std::path::PathBuf;
use tokio::net::TcpStream;

#[derive(Debug, Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Command {
    /// Decode a bencoded value and print it as JSON.
    Decode { value: String },
    /// Print a torrent file's tracker URL, length, info hash and piece hashes.
    Info { torrent: PathBuf },
    /// Announce to the tracker and print the peer list.
    Peers { torrent: PathBuf },
    /// Perform the peer handshake and print the remote peer id.
    Handshake { torrent: PathBuf, peer_addr: SocketAddrV4 },
    /// Download a single piece and write it to a file.
    DownloadPiece {
        #[arg(short)]
        output: PathBuf,
        torrent: PathBuf,
        piece_index: usize,
    },
    /// Download the whole file.
    Download {
        #[arg(short)]
        output: PathBuf,
        torrent: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Decode { value } => decode(&value)?,
        Command::Info { torrent } => info(&torrent).await?,
        Command::Peers { torrent } => peers(&torrent).await?,
        Command::Handshake { torrent, peer_addr } => handshake(&torrent, peer_addr).await?,
        Command::DownloadPiece {
            output,
            torrent,
            piece_index,
        } => download_piece(&output, &torrent, piece_index).await?,
        Command::Download { output, torrent } => download(&output, &torrent).await?,
    }
    Ok(())
}

fn decode(value: &str) -> anyhow::Result<()> {
    let decoded = bencode::decode_full(value.as_bytes()).context("decode bencoded value")?;
    println!("{}", to_json(&decoded));
    Ok(())
}

/// Renders a bencode [`Value`] as JSON text, for the `decode` subcommand
/// only: byte strings that aren't valid UTF-8 are rendered lossily, which is
/// fine for eyeballing CLI output but not a property [`bencode`] itself
/// needs to guarantee.
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::ByteString(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        Value::Integer(n) => serde_json::Value::Number((*n).into()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Dict(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), to_json(v)))
                .collect(),
        ),
    }
}

async fn read_metainfo(torrent: &PathBuf) -> anyhow::Result<Metainfo> {
    let bytes = tokio::fs::read(torrent)
        .await
        .with_context(|| format!("read torrent file {}", torrent.display()))?;
    Metainfo::parse(&bytes).context("parse torrent file")
}

async fn info(torrent: &PathBuf) -> anyhow::Result<()> {
    let metainfo = read_metainfo(torrent).await?;
    println!("Tracker URL: {}", metainfo.announce);
    println!("Length: {}", metainfo.length);
    println!("Info Hash: {}", hex::encode(metainfo.info_hash()));
    println!("Piece Length: {}", metainfo.piece_length);
    println!("Piece Hashes:");
    for hash in &metainfo.piece_hashes {
        println!("{}", hex::encode(hash));
    }
    Ok(())
}

async fn peers(torrent: &PathBuf) -> anyhow::Result<()> {
    let metainfo = read_metainfo(torrent).await?;
    let peer_id = tracker::generate_peer_id();
    let response = tracker::announce(
        &metainfo.announce,
        metainfo.info_hash(),
        peer_id,
        metainfo.length,
        tracker::default_port(),
    )
    .await
    .context("announce to tracker")?;
    for addr in response.peers {
        println!("{addr}");
    }
    Ok(())
}

async fn handshake(torrent: &PathBuf, peer_addr: SocketAddrV4) -> anyhow::Result<()> {
    let metainfo = read_metainfo(torrent).await?;
    let our_peer_id = tracker::generate_peer_id();
    let mut stream = TcpStream::connect(peer_addr)
        .await
        .with_context(|| format!("connect to peer {peer_addr}"))?;
    let remote = Handshake::exchange(&mut stream, metainfo.info_hash(), our_peer_id)
        .await
        .context("exchange handshake")?;
    println!("Peer ID: {}", hex::encode(remote.peer_id));
    Ok(())
}

async fn download_piece(output: &PathBuf, torrent: &PathBuf, piece_index: usize) -> anyhow::Result<()> {
    let metainfo = read_metainfo(torrent).await?;
    let Some(piece) = PieceInfo::new(piece_index, &metainfo) else {
        bail!(
            "piece index {piece_index} is out of range (torrent has {} pieces)",
            metainfo.num_pieces()
        );
    };

    let peer_id = tracker::generate_peer_id();
    let response = tracker::announce(
        &metainfo.announce,
        metainfo.info_hash(),
        peer_id,
        metainfo.length,
        tracker::default_port(),
    )
    .await
    .context("announce to tracker")?;
    let addr = response
        .peers
        .into_iter()
        .next()
        .context("tracker returned no peers")?;

    let mut session = PeerSession::connect(addr, metainfo.info_hash(), peer_id, metainfo.num_pieces())
        .await
        .with_context(|| format!("connect to peer {addr}"))?;
    let bytes = session
        .download_piece(piece)
        .await
        .context("download piece")?;

    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    let hash: [u8; 20] = hasher.finalize().into();
    if hash != piece.hash {
        bail!("piece {piece_index} failed its integrity check");
    }

    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("write {}", output.display()))?;
    println!("Piece {piece_index} downloaded to {}.", output.display());
    Ok(())
}

async fn download(output: &PathBuf, torrent: &PathBuf) -> anyhow::Result<()> {
    let metainfo = read_metainfo(torrent).await?;
    let peer_id = tracker::generate_peer_id();
    let response = tracker::announce(
        &metainfo.announce,
        metainfo.info_hash(),
        peer_id,
        metainfo.length,
        tracker::default_port(),
    )
    .await
    .context("announce to tracker")?;

    let pieces = scheduler::download_all(&metainfo, response.peers, peer_id)
        .await
        .context("download torrent")?;
    assembler::assemble(&metainfo, pieces, output)
        .await
        .with_context(|| format!("write {}", output.display()))?;
    println!("Downloaded {} to {}.", torrent.display(), output.display());
    Ok(())
}
