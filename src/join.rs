//! Peer discovery handshake: reverse-lookup then join broadcast (spec §4.G).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::attr_cmd::AttrCommand;
use crate::error::NodeError;
use crate::flags::CmdFlags;
use crate::oid::Oid;
use crate::peer::PeerState;
use crate::txn::{Transaction, TransactionTable};
use crate::wire::header::{AddressAttr, AttrHeader, CmdHeader};
use crate::wire::io::{read_cmd, write_cmd};

/// Connect to `addr`, send a `REVERSE_LOOKUP`, and wait (bounded by
/// `timeout`) for the peer's advertised OID and canonical address.
///
/// The returned peer record uses the response's OID and address, not the
/// connect address, since a peer may advertise a different listener
/// (spec §4.G step 4).
///
/// # Errors
/// Returns [`NodeError::Timeout`] if no reply arrives in time,
/// [`NodeError::Proto`] if the reply cannot be parsed as an address
/// command, or [`NodeError::Io`] on a connection failure. On any error the
/// socket is dropped and no peer is added.
pub async fn reverse_lookup(addr: SocketAddr, timeout: Duration) -> Result<(Oid, SocketAddr), NodeError> {
    let mut stream = TcpStream::connect(addr).await?;

    let attr_header = AttrHeader { cmd: AttrCommand::ReverseLookup, size: 0, flags: 0 };
    let payload = attr_header.to_bytes().to_vec();
    let req = CmdHeader {
        id: Oid::ZERO,
        flags: CmdFlags::empty(),
        status: 0,
        size: payload.len() as u64,
        trans: 0,
    };
    write_cmd(&mut stream, &req, &payload, timeout).await?;

    let (header, reply_payload) = read_cmd(&mut stream, timeout).await?;
    let body = reply_payload.get(crate::wire::header::ATTR_HEADER_LEN..).unwrap_or(&[]);
    let (address, port) = AddressAttr::from_bytes_with_port(body).ok_or(NodeError::Proto)?;
    let peer_addr = address.socket_addr(port)?;

    // The source derives the peer's OID from the accompanying `addr_cmd`'s
    // `cmd.id` field, not from anything on the TCP connection itself; here
    // that's the command header carried in the reply.
    let peer_id = Oid::from_slice(header.id.as_bytes());

    info!(peer = %peer_id, addr = %peer_addr, "reverse lookup succeeded");
    Ok((peer_id, peer_addr))
}

/// Broadcast a `JOIN` carrying `local_addr` to every peer in `peers`
/// (spec §4.G step 5), so the overlay learns of this node.
///
/// `peers` is a snapshot (e.g. `PeerTable::iter().cloned().collect()`)
/// rather than a live table reference, so the peer-list lock is never held
/// across the per-peer `transaction_lock` acquisitions and sends below
/// (spec §5 lock ordering: `transaction_lock` is a leaf, never nested
/// under another lock).
///
/// Each send is tracked under its own freshly allocated, callback-free
/// transaction number (spec §4.D) rather than the sentinel `0`, so a
/// concurrent reply on the same connection can still be correlated by
/// transaction number even though `JOIN` itself expects no reply body.
///
/// # Errors
/// Propagates the first peer's send failure; subsequent peers are still
/// attempted.
pub async fn broadcast_join(
    peers: &[Arc<PeerState>],
    transactions: &AsyncMutex<TransactionTable>,
    local_id: Oid,
    local_addr: SocketAddr,
) -> Result<(), NodeError> {
    let (raw_addr, family) = match local_addr {
        SocketAddr::V4(v4) => (v4.ip().octets().to_vec(), 2u16),
        SocketAddr::V6(v6) => (v6.ip().octets().to_vec(), 10u16),
    };
    let address = AddressAttr { addr: raw_addr, sock_type: 1, family };
    let address_bytes = address.to_bytes_with_port(local_addr.port());

    #[expect(clippy::cast_possible_truncation, reason = "address bodies are well under u32::MAX")]
    let attr_header = AttrHeader { cmd: AttrCommand::Join, size: address_bytes.len() as u32, flags: 0 };
    let mut payload = attr_header.to_bytes().to_vec();
    payload.extend_from_slice(&address_bytes);

    let mut first_err = None;
    for peer in peers {
        let number = {
            let mut table = transactions.lock().await;
            table.insert(Transaction { number: 0, peer: Arc::clone(peer), on_complete: None })
        };
        let req = CmdHeader {
            id: local_id,
            flags: CmdFlags::empty(),
            status: 0,
            size: payload.len() as u64,
            trans: number,
        };
        if let Err(e) = send_join_to_peer(peer, &req, &payload).await {
            warn!(peer = %peer.id, "join broadcast failed");
            first_err.get_or_insert(e);
        }
        transactions.lock().await.destroy(number, None);
    }
    first_err.map_or(Ok(()), Err)
}

async fn send_join_to_peer(
    peer: &Arc<PeerState>,
    req: &CmdHeader,
    payload: &[u8],
) -> Result<(), NodeError> {
    let mut guard = peer.send_lock.lock().await;
    let Some(write_half) = guard.as_mut() else {
        return Err(NodeError::NotFound);
    };
    write_cmd(write_half, req, payload, peer.recv_timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_join_address_round_trips_through_the_wire_format() {
        let local_addr: SocketAddr = "10.0.0.2:1234".parse().unwrap();
        let (raw_addr, family) = match local_addr {
            SocketAddr::V4(v4) => (v4.ip().octets().to_vec(), 2u16),
            SocketAddr::V6(v6) => (v6.ip().octets().to_vec(), 10u16),
        };
        let address = AddressAttr { addr: raw_addr, sock_type: 1, family };
        let bytes = address.to_bytes_with_port(local_addr.port());

        let (parsed, port) = AddressAttr::from_bytes_with_port(&bytes).unwrap();
        assert_eq!(parsed.socket_addr(port).unwrap(), local_addr);
    }
}
