//! Command dispatcher: attribute-stream walking and routing (spec §4.F).

use std::net::SocketAddr;

use tracing::{debug, warn};

use crate::attr_cmd::AttrCommand;
use crate::error::NodeError;
use crate::flags::CmdFlags;
use crate::oid::Oid;
use crate::peer::PeerTable;
use crate::storage::{self, StorageRoot};
use crate::wire::header::{ATTR_HEADER_LEN, AddressAttr, AttrHeader, CmdHeader, IO_ATTR_LEN, IoAttr};
use crate::wire::{Attr, AttrWalk};

/// Enumerates locally stored OIDs for the `LIST` operation.
///
/// The concrete enumeration strategy (scanning the storage root, consulting
/// an index, and so on) is a collaborator this dispatcher does not
/// implement (spec §1 "Out of scope": "the on-disk 'list' enumeration used
/// for reconciliation").
pub trait ObjectLister: Send + Sync {
    /// Return the OIDs this node currently stores.
    fn list(&self) -> Vec<Oid>;
}

/// A lister that reports no objects; the default when no collaborator is
/// wired in.
pub struct EmptyLister;

impl ObjectLister for EmptyLister {
    fn list(&self) -> Vec<Oid> { Vec::new() }
}

/// The state a single dispatch call needs: this node's own identity, its
/// storage root, its peer table, and an object lister (spec §4.F, §2).
pub struct DispatchContext<'a> {
    /// This node's own overlay identifier.
    pub local_id: Oid,
    /// This node's own canonical address.
    pub local_addr: SocketAddr,
    /// Content-addressed storage root.
    pub storage: &'a StorageRoot,
    /// Known peers, consulted for `LOOKUP`.
    pub peers: &'a PeerTable,
    /// `LIST` enumeration collaborator.
    pub lister: &'a dyn ObjectLister,
}

/// One outbound reply frame produced while dispatching a command.
pub struct Reply {
    /// The reply's header.
    pub header: CmdHeader,
    /// The reply's attribute-stream payload.
    pub payload: Vec<u8>,
}

/// A mutation `dispatch` cannot itself apply, because it would require
/// blocking on I/O or a write lock on the peer table while the caller holds
/// only a read lock (spec §4.F, §4.G). The caller applies these after
/// `dispatch` returns and its read lock is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Connect back to `addr` and register a peer keyed on `id` (spec §4.G
    /// step 5 "receiving half": a `JOIN` is answered by connecting back to
    /// the advertised address and adding the sender to the peer table).
    RegisterPeer {
        /// The peer's overlay identifier, taken from the request's own
        /// `CmdHeader.id` per the `dnet_cmd_join_client` bug fix (spec §9).
        id: Oid,
        /// The address to connect back to.
        addr: SocketAddr,
    },
}

/// Everything dispatching a single frame produced: reply frames to write
/// back on this connection, and side effects for the caller to apply once
/// it has released whatever lock it dispatched under.
#[derive(Default)]
pub struct DispatchOutcome {
    /// Reply frames, in the order they should be written.
    pub replies: Vec<Reply>,
    /// Mutations the caller must apply after `dispatch` returns.
    pub side_effects: Vec<SideEffect>,
}

fn address_cmd_reply(req: &CmdHeader, id: Oid, addr: &SocketAddr, attr_cmd: AttrCommand) -> Reply {
    let (raw_addr, family) = match addr {
        SocketAddr::V4(v4) => (v4.ip().octets().to_vec(), 2u16),
        SocketAddr::V6(v6) => (v6.ip().octets().to_vec(), 10u16),
    };
    let address = AddressAttr { addr: raw_addr, sock_type: 1, family };
    let address_bytes = address.to_bytes_with_port(addr.port());

    #[expect(clippy::cast_possible_truncation, reason = "address bodies are well under u32::MAX")]
    let attr_header = AttrHeader { cmd: attr_cmd, size: address_bytes.len() as u32, flags: 0 };
    let mut payload = attr_header.to_bytes().to_vec();
    payload.extend_from_slice(&address_bytes);

    Reply {
        header: CmdHeader {
            id,
            flags: CmdFlags::empty(),
            status: 0,
            size: payload.len() as u64,
            trans: CmdHeader::reply_trans(req.trans_number()),
        },
        payload,
    }
}

fn handle_lookup(ctx: &DispatchContext<'_>, req: &CmdHeader) -> Result<Option<Reply>, NodeError> {
    let target = ctx.peers.search(&req.id);
    let (id, addr) = target.map_or((ctx.local_id, ctx.local_addr), |p| (p.id, p.addr));
    Ok(Some(address_cmd_reply(req, id, &addr, AttrCommand::Lookup)))
}

fn handle_reverse_lookup(
    ctx: &DispatchContext<'_>,
    req: &CmdHeader,
) -> Result<Option<Reply>, NodeError> {
    Ok(Some(address_cmd_reply(req, ctx.local_id, &ctx.local_addr, AttrCommand::ReverseLookup)))
}

fn handle_join(req: &CmdHeader, body: &[u8]) -> Result<SideEffect, NodeError> {
    let Some((address, port)) = AddressAttr::from_bytes_with_port(body) else {
        return Err(NodeError::Proto);
    };
    let addr = address.socket_addr(port)?;
    // Registration uses `req.id`, not any peer-supplied pointer-derived
    // value, per the bug fix recorded in spec §9 ("`dnet_cmd_join_client`
    // references `st->id` ... use `cmd->id` instead").
    debug!(peer = %req.id, %addr, "join request parsed");
    Ok(SideEffect::RegisterPeer { id: req.id, addr })
}

fn parse_io_attr(body: &[u8]) -> Result<(IoAttr, &[u8]), NodeError> {
    let header_bytes = body.get(..IO_ATTR_LEN).ok_or(NodeError::Proto)?;
    let arr: [u8; IO_ATTR_LEN] = header_bytes.try_into().map_err(|_| NodeError::Proto)?;
    let io = IoAttr::from_bytes(&arr);
    let data = body.get(IO_ATTR_LEN..).unwrap_or(&[]);
    Ok((io, data))
}

fn handle_write(ctx: &DispatchContext<'_>, body: &[u8]) -> Result<Option<Reply>, NodeError> {
    let (io, data) = parse_io_attr(body)?;
    storage::write_object(ctx.storage, &io, data)?;
    Ok(None)
}

fn handle_read(ctx: &DispatchContext<'_>, req: &CmdHeader, body: &[u8]) -> Result<Vec<Reply>, NodeError> {
    let (io, _) = parse_io_attr(body)?;
    let chunks = storage::read_object(ctx.storage, &io)?;
    let mut replies = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        #[expect(clippy::cast_possible_truncation, reason = "chunk bodies are bounded by MAX_READ_TRANS_SIZE")]
        let attr_header = AttrHeader {
            cmd: AttrCommand::Read,
            size: (IO_ATTR_LEN + chunk.data.len()) as u32,
            flags: 0,
        };
        let mut payload = attr_header.to_bytes().to_vec();
        payload.extend_from_slice(&chunk.io.to_bytes());
        payload.extend_from_slice(&chunk.data);

        let flags = if chunk.more { CmdFlags::MORE } else { CmdFlags::empty() };
        replies.push(Reply {
            header: CmdHeader {
                id: req.id,
                flags,
                status: 0,
                size: payload.len() as u64,
                trans: CmdHeader::reply_trans(req.trans_number()),
            },
            payload,
        });
    }
    Ok(replies)
}

fn handle_list(ctx: &DispatchContext<'_>, req: &CmdHeader) -> Result<Option<Reply>, NodeError> {
    let ids = ctx.lister.list();
    let mut payload = Vec::with_capacity(ids.len() * crate::oid::ID_SIZE);
    for id in &ids {
        payload.extend_from_slice(id.as_bytes());
    }
    Ok(Some(Reply {
        header: CmdHeader {
            id: req.id,
            flags: CmdFlags::empty(),
            status: 0,
            size: payload.len() as u64,
            trans: CmdHeader::reply_trans(req.trans_number()),
        },
        payload,
    }))
}

fn dispatch_attr(
    ctx: &DispatchContext<'_>,
    req: &CmdHeader,
    attr: &Attr<'_>,
    outcome: &mut DispatchOutcome,
) -> Result<(), NodeError> {
    match attr.header.cmd {
        AttrCommand::Lookup => outcome.replies.extend(handle_lookup(ctx, req)?),
        AttrCommand::ReverseLookup => outcome.replies.extend(handle_reverse_lookup(ctx, req)?),
        AttrCommand::Join => outcome.side_effects.push(handle_join(req, attr.body)?),
        AttrCommand::Write => outcome.replies.extend(handle_write(ctx, attr.body)?),
        AttrCommand::Read => outcome.replies.extend(handle_read(ctx, req, attr.body)?),
        AttrCommand::List => outcome.replies.extend(handle_list(ctx, req)?),
        AttrCommand::Other(code) => {
            warn!(code, "unknown attribute command");
            return Err(NodeError::Proto);
        }
    }
    Ok(())
}

/// Parse `payload` as a stream of attributes and route each to its handler,
/// stopping at the first error (spec §4.F).
///
/// Returns the accumulated reply frames and pending side effects; the final
/// status is 0 on success, or the first error's negated-errno status. If
/// `req.flags` carries `NEED_ACK`, a trailing zero-payload ack frame is
/// appended carrying that status (spec §4.F "After the loop").
#[must_use]
pub fn dispatch(ctx: &DispatchContext<'_>, req: &CmdHeader, payload: &[u8]) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    let mut status = 0i32;

    for attr in AttrWalk::new(payload) {
        let result = match attr {
            Ok(attr) => dispatch_attr(ctx, req, &attr, &mut outcome),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            status = e.to_status();
            break;
        }
    }

    if req.flags.needs_ack() {
        outcome.replies.push(Reply {
            header: CmdHeader {
                id: req.id,
                flags: req.flags,
                status,
                size: 0,
                trans: CmdHeader::reply_trans(req.trans_number()),
            },
            payload: Vec::new(),
        });
    }
    outcome
}
