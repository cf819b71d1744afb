//! Process-wide node state and the connection accept loop (spec §3 "Node",
//! §5).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, RwLock, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::dispatcher::{DispatchContext, EmptyLister, SideEffect, dispatch};
use crate::error::NodeError;
use crate::join;
use crate::oid::Oid;
use crate::peer::{PeerState, PeerTable};
use crate::storage::StorageRoot;
use crate::transform::TransformRegistry;
use crate::txn::TransactionTable;
use crate::wire::io::{IO_TIMEOUT, read_cmd, write_cmd};

/// Process-wide node record (spec §3 "Node").
///
/// `peer_list_lock` and `transaction_lock` are modelled as
/// [`tokio::sync::RwLock`]/[`std::sync::Mutex`] equivalents per spec §5;
/// here both use `tokio::sync::RwLock`/`Mutex` so they can be held briefly
/// across the few `.await` points the accept loop needs (peer-table
/// mutation itself never awaits).
pub struct Node {
    /// This node's own overlay identifier.
    pub id: Oid,
    /// The address this node is bound to.
    pub addr: SocketAddr,
    /// Known peers (spec §4.C). Guards: `peer_list_lock`.
    pub peers: RwLock<PeerTable>,
    /// In-flight outbound transactions (spec §4.D). Guards:
    /// `transaction_lock`.
    pub transactions: AsyncMutex<TransactionTable>,
    /// Content transforms, tried in order (spec §4.B). Guards:
    /// `transform_lock`.
    pub transforms: AsyncMutex<TransformRegistry>,
    /// Content-addressed storage root.
    pub storage: StorageRoot,
}

impl Node {
    /// Construct a node rooted at `root_path`, bound to `addr`, claiming
    /// `id`, with the default transform set registered.
    ///
    /// # Errors
    /// Returns [`NodeError::Io`] if the storage root cannot be opened.
    pub fn new(id: Oid, addr: SocketAddr, root_path: &Utf8PathBuf) -> Result<Self, NodeError> {
        Ok(Self {
            id,
            addr,
            peers: RwLock::new(PeerTable::new()),
            transactions: AsyncMutex::new(TransactionTable::new()),
            transforms: AsyncMutex::new(TransformRegistry::with_default_transforms()),
            storage: StorageRoot::open(root_path)?,
        })
    }

    /// Bootstrap into an existing overlay via `bootstrap_addr` (spec §4.G):
    /// reverse-lookup the peer at that address, record it, then broadcast a
    /// join to every peer now known (itself included, so a single known
    /// peer learns this node even before further peers are discovered).
    ///
    /// # Errors
    /// Propagates [`join::reverse_lookup`]'s connection/timeout/protocol
    /// errors, or the first peer's send failure from the join broadcast.
    pub async fn bootstrap_join(&self, bootstrap_addr: SocketAddr, timeout: Duration) -> Result<(), NodeError> {
        let (peer_id, peer_addr) = join::reverse_lookup(bootstrap_addr, timeout).await?;

        let stream = TcpStream::connect(peer_addr).await?;
        let (_read_half, write_half) = stream.into_split();
        let peer = PeerState::new(peer_id, peer_addr, write_half, timeout);
        self.peers.write().await.create(peer);

        let snapshot: Vec<_> = self.peers.read().await.iter().cloned().collect();
        join::broadcast_join(&snapshot, &self.transactions, self.id, self.addr).await
    }

    /// Write `path`'s contents into this node's own store, driving the
    /// node's shared transform registry (spec §4.H `write_file`).
    ///
    /// # Errors
    /// See [`crate::client::write_file`].
    pub async fn write_local(&self, path: &Utf8Path) -> Result<Oid, NodeError> {
        let mut registry = self.transforms.lock().await;
        crate::client::write_file(&mut registry, &self.storage, path)
    }

    /// Read the object addressed by `path`'s name-id from this node's own
    /// store into `dest` (spec §4.H `read_file`).
    ///
    /// # Errors
    /// See [`crate::client::read_file`].
    pub async fn read_local(
        &self,
        path: &Utf8Path,
        dest: &Utf8Path,
        offset: u64,
        size: u64,
    ) -> Result<(), NodeError> {
        let mut registry = self.transforms.lock().await;
        crate::client::read_file(&mut registry, &self.storage, path, dest, offset, size)
    }

    /// Accept connections on `listener` until `shutdown` fires, dispatching
    /// each received frame inline on its own task (spec §5 "one reader
    /// thread per peer connection").
    pub async fn serve(
        self: &Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                () = shutdown_changed(&mut shutdown) => {
                    info!("shutdown signal received");
                    break;
                }
                res = listener.accept() => {
                    match res {
                        Ok((socket, peer_addr)) => {
                            let node = Arc::clone(self);
                            let mut rx = shutdown.clone();
                            tasks.spawn(async move {
                                if let Err(e) = node.handle_connection(socket, peer_addr, &mut rx).await {
                                    warn!(peer = %peer_addr, error = %e, "connection terminated");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
            }
        }
        while tasks.join_next().await.is_some() {}
    }

    async fn handle_connection(
        &self,
        mut socket: TcpStream,
        peer_addr: SocketAddr,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), NodeError> {
        info!(peer = %peer_addr, "connection accepted");
        loop {
            tokio::select! {
                frame = read_cmd(&mut socket, IO_TIMEOUT) => {
                    let (header, payload) = frame?;
                    self.dispatch_and_reply(&mut socket, &header, &payload).await?;
                }
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn dispatch_and_reply(
        &self,
        socket: &mut TcpStream,
        header: &crate::wire::header::CmdHeader,
        payload: &[u8],
    ) -> Result<(), NodeError> {
        let peers = self.peers.read().await;
        let ctx = DispatchContext {
            local_id: self.id,
            local_addr: self.addr,
            storage: &self.storage,
            peers: &peers,
            lister: &EmptyLister,
        };
        let outcome = dispatch(&ctx, header, payload);
        drop(peers);

        for effect in outcome.side_effects {
            self.apply_side_effect(effect).await;
        }
        for reply in outcome.replies {
            write_cmd(socket, &reply.header, &reply.payload, Duration::from_secs(30)).await?;
        }
        Ok(())
    }

    /// Apply a mutation `dispatch` deferred because it needed the write lock
    /// or blocking I/O this connection's read lock couldn't provide (spec
    /// §4.F, §4.G step 5 "receiving half").
    async fn apply_side_effect(&self, effect: SideEffect) {
        match effect {
            SideEffect::RegisterPeer { id, addr } => {
                if let Err(e) = self.register_peer(id, addr).await {
                    warn!(peer = %id, %addr, error = %e, "failed to connect back for join");
                }
            }
        }
    }

    async fn register_peer(&self, id: Oid, addr: SocketAddr) -> Result<(), NodeError> {
        let stream = TcpStream::connect(addr).await?;
        let (_read_half, write_half) = stream.into_split();
        let peer = PeerState::new(id, addr, write_half, IO_TIMEOUT);
        self.peers.write().await.create(peer);
        info!(peer = %id, %addr, "registered peer from join");
        Ok(())
    }
}

async fn shutdown_changed(rx: &mut watch::Receiver<bool>) {
    let _ = rx.changed().await;
}
