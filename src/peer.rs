//! Peer state and the peer table (spec §3 "Peer state", §4.C).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::oid::Oid;

/// A remote peer's connection state.
///
/// Created on accept or on a successful connect+handshake; destroyed on
/// socket close or protocol error (spec §3 "Peer state"). The write half is
/// wrapped in an async mutex serving as `peer.send_lock`: one logical frame
/// (header plus any inline payload) is sent under a single acquisition so
/// frames are never interleaved on the wire (spec §5).
pub struct PeerState {
    /// The peer's claimed overlay identifier.
    pub id: Oid,
    /// The peer's canonical address, as advertised during the handshake —
    /// not necessarily the TCP-observed remote address (spec §4.G).
    pub addr: SocketAddr,
    /// Serialises writes to this peer's socket.
    pub send_lock: AsyncMutex<Option<OwnedWriteHalf>>,
    /// Receive timeout applied to this peer's connection.
    pub recv_timeout: Duration,
}

impl PeerState {
    /// Construct a peer record around an already-split write half.
    #[must_use]
    pub fn new(id: Oid, addr: SocketAddr, write_half: OwnedWriteHalf, recv_timeout: Duration) -> Self {
        Self { id, addr, send_lock: AsyncMutex::new(Some(write_half)), recv_timeout }
    }

    /// Flip the destroy flag by taking the write half, causing any future
    /// send attempt to observe `None` and fail rather than write to a
    /// half-closed socket (spec §9 "Ref-counted peers with async teardown").
    pub async fn mark_destroyed(&self) {
        let mut guard = self.send_lock.lock().await;
        *guard = None;
    }
}

/// Sorted-by-OID table of known peers, plus the local node's own entry
/// (spec §3 "Node", §4.C).
///
/// The reference design keeps peers in an OID-sorted list and does a
/// lexicographic-predecessor search; a `BTreeMap` gives the same ordering
/// invariant with O(log n) lookups instead of the source's O(n) linear scan
/// (spec §4.C: "implementations must preserve" the sortedness, not the scan
/// itself).
#[derive(Default)]
pub struct PeerTable {
    peers: BTreeMap<Oid, Arc<PeerState>>,
}

impl PeerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self { peers: BTreeMap::new() } }

    /// Insert a newly created peer, returning the shared handle held by the
    /// table.
    pub fn create(&mut self, peer: PeerState) -> Arc<PeerState> {
        let handle = Arc::new(peer);
        self.peers.insert(handle.id, Arc::clone(&handle));
        handle
    }

    /// Return the peer whose OID is the closest lexicographic predecessor
    /// of `target`, or `None` if the table is empty (caller substitutes the
    /// local self-peer, spec §4.C).
    #[must_use]
    pub fn search(&self, target: &Oid) -> Option<Arc<PeerState>> {
        self.peers
            .range(..=*target)
            .next_back()
            .map(|(_, peer)| Arc::clone(peer))
            .or_else(|| self.peers.values().next().cloned())
    }

    /// Return any peer other than `excluding`, used when a client request
    /// needs a starting hop (spec §4.C `first`).
    #[must_use]
    pub fn first(&self, excluding: Option<&Oid>) -> Option<Arc<PeerState>> {
        self.peers
            .iter()
            .find(|(id, _)| Some(*id) != excluding)
            .map(|(_, peer)| Arc::clone(peer))
    }

    /// Look up a peer by exact OID.
    #[must_use]
    pub fn get(&self, id: &Oid) -> Option<Arc<PeerState>> { self.peers.get(id).cloned() }

    /// Remove a peer entirely, dropping the table's reference. Other
    /// holders keep the record alive until their own `Arc` drops (spec §4.C
    /// `put`, §9 "Ref-counted peers").
    pub fn remove(&mut self, id: &Oid) -> Option<Arc<PeerState>> { self.peers.remove(id) }

    /// Re-sort a peer after its OID changed (join completion, spec §4.C
    /// `move`): remove the old entry and reinsert under the new id.
    pub fn move_peer(&mut self, old_id: &Oid, peer: Arc<PeerState>) {
        self.peers.remove(old_id);
        self.peers.insert(peer.id, peer);
    }

    /// Iterate over all known peers, used for join broadcast (spec §4.G).
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PeerState>> { self.peers.values() }

    /// Number of peers currently tracked.
    #[must_use]
    pub fn len(&self) -> usize { self.peers.len() }

    /// Whether the table currently tracks no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.peers.is_empty() }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn fake_peer(id: Oid) -> Arc<PeerState> {
        Arc::new(PeerState {
            id,
            addr: addr(9000),
            send_lock: AsyncMutex::new(None),
            recv_timeout: Duration::from_secs(1),
        })
    }

    #[test]
    fn search_finds_predecessor() {
        let mut table = PeerTable::new();
        let low = fake_peer(Oid::from_slice(&[1]));
        let high = fake_peer(Oid::from_slice(&[10]));
        table.peers.insert(low.id, Arc::clone(&low));
        table.peers.insert(high.id, Arc::clone(&high));

        let found = table.search(&Oid::from_slice(&[5])).unwrap();
        assert_eq!(found.id, low.id);
    }

    #[test]
    fn search_falls_back_when_no_predecessor() {
        let mut table = PeerTable::new();
        let only = fake_peer(Oid::from_slice(&[10]));
        table.peers.insert(only.id, Arc::clone(&only));

        let found = table.search(&Oid::from_slice(&[1])).unwrap();
        assert_eq!(found.id, only.id);
    }

    #[test]
    fn empty_table_search_returns_none() {
        let table = PeerTable::new();
        assert!(table.search(&Oid::ZERO).is_none());
    }

    #[test]
    fn first_excludes_given_peer() {
        let mut table = PeerTable::new();
        let a = fake_peer(Oid::from_slice(&[1]));
        let b = fake_peer(Oid::from_slice(&[2]));
        table.peers.insert(a.id, Arc::clone(&a));
        table.peers.insert(b.id, Arc::clone(&b));

        let found = table.first(Some(&a.id)).unwrap();
        assert_eq!(found.id, b.id);
    }

    #[test]
    fn move_peer_updates_sort_key() {
        let mut table = PeerTable::new();
        let peer = fake_peer(Oid::from_slice(&[1]));
        table.peers.insert(peer.id, Arc::clone(&peer));

        let moved = Arc::new(PeerState {
            id: Oid::from_slice(&[99]),
            addr: peer.addr,
            send_lock: AsyncMutex::new(None),
            recv_timeout: peer.recv_timeout,
        });
        table.move_peer(&Oid::from_slice(&[1]), Arc::clone(&moved));

        assert!(table.get(&Oid::from_slice(&[1])).is_none());
        assert!(table.get(&Oid::from_slice(&[99])).is_some());
    }
}
