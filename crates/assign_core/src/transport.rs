//! Addressed message delivery between peers.
//!
//! Outbound messages are sealed into [`Envelope`]s and pushed onto per-peer
//! channels; whatever drains a channel (a TCP writer task, or another peer's
//! inbox in tests) owns delivery from there. Inbound frames are queued by the
//! network side and drained by the tick loop with [`Transport::try_recv`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use assignproto::envelope::Envelope;
use assignproto::tags;
use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, info};

use crate::types::PlayerId;

pub trait Transport {
    fn is_host(&self) -> bool;

    fn local_player(&self) -> PlayerId;

    fn connected_players(&self) -> Vec<PlayerId>;

    fn is_connected(&self) -> bool;

    fn send_to(&self, to: PlayerId, tag: &str, payload: Bytes);

    /// One sealed copy per connected player, each addressed to its recipient.
    fn send_to_all(&self, tag: &str, payload: Bytes) {
        for p in self.connected_players() {
            self.send_to(p, tag, payload.clone());
        }
    }

    /// Next raw inbound frame, if one is queued.
    fn try_recv(&mut self) -> Option<Bytes>;
}

/// Outbound channel per reachable player. Each entry carries encoded envelopes.
pub type PeerTable = Arc<Mutex<BTreeMap<PlayerId, UnboundedSender<Bytes>>>>;

pub fn new_peer_table() -> PeerTable {
    Arc::new(Mutex::new(BTreeMap::new()))
}

pub fn lock_peers(peers: &PeerTable) -> MutexGuard<'_, BTreeMap<PlayerId, UnboundedSender<Bytes>>> {
    peers.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct ChannelTransport {
    local: PlayerId,
    host: bool,
    peers: PeerTable,
    /// Loopback on the host, the host's broadcasts on a client.
    inbox: UnboundedReceiver<Bytes>,
    /// Host only: frames clients sent us. Never dispatched as events.
    uplink: Option<UnboundedReceiver<Bytes>>,
    connected: Arc<AtomicBool>,
}

impl ChannelTransport {
    pub fn new(
        local: PlayerId,
        host: bool,
        peers: PeerTable,
        inbox: UnboundedReceiver<Bytes>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            local,
            host,
            peers,
            inbox,
            uplink: None,
            connected,
        }
    }

    /// Give a host somewhere to park client-originated frames so they stay
    /// out of its inbox.
    pub fn with_uplink(mut self, uplink: UnboundedReceiver<Bytes>) -> Self {
        self.uplink = Some(uplink);
        self
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// A welcome assigns a client its player id. Returns true if `frame`
    /// was one. The host numbers itself and never takes a welcome.
    fn take_welcome(&mut self, frame: &Bytes) -> bool {
        if self.host {
            return false;
        }
        let Ok(env) = Envelope::open(frame.clone()) else {
            return false;
        };
        if env.tag != tags::WELCOME {
            return false;
        }
        self.local = PlayerId(env.recipient);
        info!(player = %self.local, "welcomed by host");
        true
    }
}

impl Transport for ChannelTransport {
    fn is_host(&self) -> bool {
        self.host
    }

    fn local_player(&self) -> PlayerId {
        self.local
    }

    fn connected_players(&self) -> Vec<PlayerId> {
        lock_peers(&self.peers).keys().copied().collect()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn send_to(&self, to: PlayerId, tag: &str, payload: Bytes) {
        let frame = Envelope::seal(tag, to.0, payload).encode();
        let peers = lock_peers(&self.peers);
        match peers.get(&to) {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    debug!(player = %to, tag, "peer channel closed");
                }
            }
            None => debug!(player = %to, tag, "no route to player"),
        }
    }

    fn try_recv(&mut self) -> Option<Bytes> {
        if let Some(uplink) = self.uplink.as_mut() {
            let mut dropped = 0usize;
            while uplink.try_recv().is_ok() {
                dropped += 1;
            }
            if dropped > 0 {
                debug!(dropped, "ignoring frames sent by clients");
            }
        }
        loop {
            match self.inbox.try_recv() {
                Ok(frame) => {
                    if self.take_welcome(&frame) {
                        continue;
                    }
                    return Some(frame);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.connected.store(false, Ordering::Relaxed);
                    return None;
                }
            }
        }
    }
}

/// In-process star network: one host, any number of clients. Clients only
/// route to the host's uplink; the host routes to everyone including itself.
pub struct Hub {
    host_table: PeerTable,
    host_id: Option<PlayerId>,
    uplink: Option<UnboundedSender<Bytes>>,
    flags: BTreeMap<PlayerId, Arc<AtomicBool>>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            host_table: new_peer_table(),
            host_id: None,
            uplink: None,
            flags: BTreeMap::new(),
        }
    }

    pub fn host(&mut self, id: PlayerId) -> ChannelTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        lock_peers(&self.host_table).insert(id, tx);
        self.host_id = Some(id);
        let connected = Arc::new(AtomicBool::new(true));
        self.flags.insert(id, connected.clone());
        let (up_tx, up_rx) = mpsc::unbounded_channel();
        self.uplink = Some(up_tx);
        ChannelTransport::new(id, true, self.host_table.clone(), rx, connected).with_uplink(up_rx)
    }

    pub fn client(&mut self, id: PlayerId) -> ChannelTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let own = new_peer_table();
        if let (Some(h), Some(up)) = (self.host_id, self.uplink.as_ref()) {
            lock_peers(&own).insert(h, up.clone());
        }
        lock_peers(&self.host_table).insert(id, tx);
        let connected = Arc::new(AtomicBool::new(true));
        self.flags.insert(id, connected.clone());
        ChannelTransport::new(id, false, own, rx, connected)
    }

    /// Drop `id` from the host's routes and mark it disconnected.
    pub fn disconnect(&mut self, id: PlayerId) {
        lock_peers(&self.host_table).remove(&id);
        if let Some(flag) = self.flags.remove(&id) {
            flag.store(false, Ordering::Relaxed);
        }
    }
}
