//! TCP plumbing: a star with the host in the middle.
//!
//! Every connection gets a writer task draining its outbound channel and a
//! reader task feeding the host's uplink, kept apart from its loopback inbox.
//! The tick loop only ever sees the resulting [`ChannelTransport`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use assign_core::transport::{PeerTable, lock_peers, new_peer_table};
use assign_core::{ChannelTransport, PlayerId};
use assignio::frame::{FrameReader, FrameWriter};
use assignproto::envelope::Envelope;
use assignproto::tags;
use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const HOST_ID: PlayerId = PlayerId(1);

pub async fn start_host(bind: SocketAddr) -> anyhow::Result<ChannelTransport> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(bind = %bind, "host listening");

    let peers = new_peer_table();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    // Loopback: the host applies its own broadcasts like everyone else.
    lock_peers(&peers).insert(HOST_ID, inbox_tx);
    let (uplink_tx, uplink_rx) = mpsc::unbounded_channel();

    tokio::spawn(accept_loop(listener, peers.clone(), uplink_tx));
    Ok(ChannelTransport::new(
        HOST_ID,
        true,
        peers,
        inbox_rx,
        Arc::new(AtomicBool::new(true)),
    )
    .with_uplink(uplink_rx))
}

async fn accept_loop(listener: TcpListener, peers: PeerTable, uplink: mpsc::UnboundedSender<Bytes>) {
    let mut next_id = HOST_ID.0 + 1;
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(err = %e, "accept failed");
                continue;
            }
        };
        let player = PlayerId(next_id);
        next_id += 1;
        info!(peer = %addr, player = %player, "client connected");

        let peers = peers.clone();
        let uplink = uplink.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_client(stream, player, peers.clone(), uplink).await {
                warn!(player = %player, err = %e, "client connection ended with error");
            }
            lock_peers(&peers).remove(&player);
            info!(player = %player, "client disconnected");
        });
    }
}

async fn serve_client(
    stream: TcpStream,
    player: PlayerId,
    peers: PeerTable,
    uplink: mpsc::UnboundedSender<Bytes>,
) -> anyhow::Result<()> {
    let (rd, wr) = stream.into_split();
    let mut fw = FrameWriter::new(wr);

    // Before the route exists, so the welcome is the first frame they see.
    let welcome = Envelope::seal(tags::WELCOME, player.0, Bytes::new());
    fw.write_envelope(&welcome).await.context("send welcome")?;
    fw.flush().await?;

    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    lock_peers(&peers).insert(player, tx);
    let writer = tokio::spawn(write_loop(fw, rx));

    let mut fr = FrameReader::new(rd);
    let res = loop {
        match fr.read_frame().await {
            Ok(Some(frame)) => {
                let _ = uplink.send(frame);
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        }
    };
    writer.abort();
    res
}

async fn write_loop<W: AsyncWrite + Unpin>(mut fw: FrameWriter<W>, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(frame) = rx.recv().await {
        if fw.write_frame(&frame).await.is_err() || fw.flush().await.is_err() {
            break;
        }
    }
}

pub async fn connect_client(addr: SocketAddr) -> anyhow::Result<ChannelTransport> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connect {addr}"))?;
    info!(host = %addr, "connected to host");
    let (rd, wr) = stream.into_split();

    let peers = new_peer_table();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Bytes>();
    lock_peers(&peers).insert(HOST_ID, out_tx);
    tokio::spawn(write_loop(FrameWriter::new(wr), out_rx));

    let connected = Arc::new(AtomicBool::new(true));
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let flag = connected.clone();
    tokio::spawn(async move {
        let mut fr = FrameReader::new(rd);
        loop {
            match fr.read_frame().await {
                Ok(Some(frame)) => {
                    if inbox_tx.send(frame).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(err = %e, "host read failed");
                    break;
                }
            }
        }
        flag.store(false, Ordering::Relaxed);
    });

    // Real id arrives with the welcome.
    Ok(ChannelTransport::new(
        PlayerId(0),
        false,
        peers,
        inbox_rx,
        connected,
    ))
}
