//! Utilities for integration tests.
//!
//! `test-util` spins up an in-process [`dnode::node::Node`] bound to an
//! ephemeral port, and provides a minimal client for writing raw command
//! frames to it and reading replies back, so integration suites can exercise
//! the wire protocol without spawning a subprocess.

use std::net::SocketAddr;
use std::sync::Arc;

use camino::Utf8PathBuf;
use dnode::node::Node;
use dnode::oid::Oid;
use dnode::wire::header::CmdHeader;
use dnode::wire::io::{read_cmd, write_cmd};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A running node plus the resources needed to tear it down.
pub struct TestNode {
    pub addr: SocketAddr,
    pub id: Oid,
    pub node: Arc<Node>,
    _root: TempDir,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TestNode {
    /// Open a client connection to this node.
    pub async fn connect(&self) -> Result<TcpStream, AnyError> {
        Ok(TcpStream::connect(self.addr).await?)
    }

    /// Number of peers this node currently knows about.
    pub async fn peer_count(&self) -> usize { self.node.peers.read().await.len() }

    /// Whether this node's peer table contains `id`.
    pub async fn knows_peer(&self, id: &Oid) -> bool { self.node.peers.read().await.get(id).is_some() }

    /// Signal the node to stop accepting connections and wait for its
    /// accept loop to drain in-flight tasks.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Bind a fresh node on an ephemeral localhost port, backed by a fresh
/// temporary storage root, and spawn its accept loop.
///
/// # Errors
/// Propagates any I/O error from binding the listener or opening the
/// storage root.
pub async fn spawn_node() -> Result<TestNode, AnyError> {
    let root = tempfile::tempdir()?;
    let root_path = Utf8PathBuf::from_path_buf(root.path().to_path_buf())
        .map_err(|_| "temp dir path is not valid UTF-8".to_string())?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    // Derived from the ephemeral port so nodes spawned in the same test
    // (e.g. to exercise join) don't collide on identity.
    let mut id_bytes = [7u8; 32];
    id_bytes[..2].copy_from_slice(&addr.port().to_be_bytes());
    let id = Oid::from_slice(&id_bytes);

    let node = Arc::new(Node::new(id, addr, &root_path)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let serve_node = Arc::clone(&node);
    let task = tokio::spawn(async move {
        serve_node.serve(listener, shutdown_rx).await;
    });

    Ok(TestNode { addr, id, node, _root: root, shutdown: shutdown_tx, task: Some(task) })
}

/// Send a command frame and wait for its reply, bounded by a generous
/// per-call timeout so a hung server fails the test instead of the suite.
///
/// # Errors
/// Propagates any protocol or I/O error surfaced while writing the request
/// or reading the reply.
pub async fn round_trip(
    stream: &mut TcpStream,
    header: &CmdHeader,
    payload: &[u8],
) -> Result<(CmdHeader, Vec<u8>), AnyError> {
    let timeout = Duration::from_secs(5);
    write_cmd(stream, header, payload, timeout).await?;
    Ok(read_cmd(stream, timeout).await?)
}
