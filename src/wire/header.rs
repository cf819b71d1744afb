//! Fixed-width wire headers and their network/host byte-order converters
//! (spec §4.A, §6).
//!
//! Every converter here is an involution: applying it twice on any bit
//! pattern returns the original value. Receivers call `from_network` right
//! after reading the fixed bytes; senders call `to_network` right before
//! writing them.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::NodeError;
use crate::{attr_cmd::AttrCommand, flags::CmdFlags, flags::IoFlags, oid::ID_SIZE, oid::Oid};

/// Bytes occupied by a [`CmdHeader`] on the wire.
pub const CMD_HEADER_LEN: usize = ID_SIZE + 4 + 4 + 8 + 8;
/// Bytes occupied by an [`AttrHeader`] on the wire.
pub const ATTR_HEADER_LEN: usize = 4 + 4 + 4;
/// Bytes occupied by an [`IoAttr`] on the wire.
pub const IO_ATTR_LEN: usize = ID_SIZE + 8 + 8 + 4;

/// High bit of `cmd.trans` marking a reply frame (spec §3, §4.D).
pub const TRANS_REPLY_BIT: u64 = 1 << 63;

/// Command frame header: source OID, flags, status, payload size, and
/// transaction number (spec §3 "Framed command").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdHeader {
    /// OID of the object or peer this command addresses.
    pub id: Oid,
    /// `NEED_ACK` / `MORE` / `DESTROY` bitset.
    pub flags: CmdFlags,
    /// Signed status; 0 on success, negative negated-errno on failure.
    pub status: i32,
    /// Bytes following this header that make up the attribute stream.
    pub size: u64,
    /// Transaction number with the reply bit folded into the high bit.
    pub trans: u64,
}

impl CmdHeader {
    /// Whether the reply bit is set on [`Self::trans`].
    #[must_use]
    pub const fn is_reply(&self) -> bool { self.trans & TRANS_REPLY_BIT != 0 }

    /// The transaction number with the reply bit masked off.
    #[must_use]
    pub const fn trans_number(&self) -> u64 { self.trans & !TRANS_REPLY_BIT }

    /// Build the reply-bit-set transaction number for a given request number.
    #[must_use]
    pub const fn reply_trans(number: u64) -> u64 { number | TRANS_REPLY_BIT }

    /// Serialise into network byte order.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CMD_HEADER_LEN] {
        let mut buf = [0u8; CMD_HEADER_LEN];
        let mut w = Writer::new(&mut buf);
        w.put_bytes(self.id.as_bytes());
        w.put_u32(self.flags.bits());
        #[expect(
            clippy::cast_sign_loss,
            reason = "bit pattern preserved, reinterpreted as unsigned on the wire"
        )]
        w.put_u32(self.status as u32);
        w.put_u64(self.size);
        w.put_u64(self.trans);
        buf
    }

    /// Parse from a network-byte-order buffer.
    #[must_use]
    pub fn from_bytes(buf: &[u8; CMD_HEADER_LEN]) -> Self {
        let mut r = Reader::new(buf);
        let id = Oid::from_slice(r.take(ID_SIZE));
        let flags = CmdFlags::from_bits_truncate(r.u32());
        #[expect(
            clippy::cast_possible_wrap,
            reason = "status is transmitted as the bit pattern of a signed i32"
        )]
        let status = r.u32() as i32;
        let size = r.u64();
        let trans = r.u64();
        Self { id, flags, status, size, trans }
    }
}

/// Attribute header: operation selector, payload size, and flags
/// (spec §3 "Attribute").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrHeader {
    /// Operation this attribute requests.
    pub cmd: AttrCommand,
    /// Bytes following this header that belong to the attribute's body.
    pub size: u32,
    /// Attribute-specific flags; unused by the current operation set.
    pub flags: u32,
}

impl AttrHeader {
    /// Serialise into network byte order.
    #[must_use]
    pub fn to_bytes(self) -> [u8; ATTR_HEADER_LEN] {
        let mut buf = [0u8; ATTR_HEADER_LEN];
        let mut w = Writer::new(&mut buf);
        w.put_u32(u32::from(self.cmd));
        w.put_u32(self.size);
        w.put_u32(self.flags);
        buf
    }

    /// Parse from a network-byte-order buffer.
    #[must_use]
    pub fn from_bytes(buf: &[u8; ATTR_HEADER_LEN]) -> Self {
        let mut r = Reader::new(buf);
        let cmd = AttrCommand::from(r.u32());
        let size = r.u32();
        let flags = r.u32();
        Self { cmd, size, flags }
    }
}

/// Read/write-operation body: target OID, offset, size, and flags
/// (spec §3 "IO attribute").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoAttr {
    /// Target object identifier.
    pub id: Oid,
    /// Byte offset into the object.
    pub offset: u64,
    /// Byte count of the associated data.
    pub size: u64,
    /// `APPEND` / `UPDATE` bitset.
    pub flags: IoFlags,
}

impl IoAttr {
    /// Serialise into network byte order.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; IO_ATTR_LEN] {
        let mut buf = [0u8; IO_ATTR_LEN];
        let mut w = Writer::new(&mut buf);
        w.put_bytes(self.id.as_bytes());
        w.put_u64(self.offset);
        w.put_u64(self.size);
        w.put_u32(self.flags.bits());
        buf
    }

    /// Parse from a network-byte-order buffer.
    #[must_use]
    pub fn from_bytes(buf: &[u8; IO_ATTR_LEN]) -> Self {
        let mut r = Reader::new(buf);
        let id = Oid::from_slice(r.take(ID_SIZE));
        let offset = r.u64();
        let size = r.u64();
        let flags = IoFlags::from_bits_truncate(r.u32());
        Self { id, offset, size, flags }
    }
}

/// Peer socket address plus the metadata needed to reconstruct it
/// (spec §3 "Address attribute").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressAttr {
    /// Raw address bytes (e.g. a serialised `sockaddr`).
    pub addr: Vec<u8>,
    /// Socket type (`SOCK_STREAM` and friends), opaque to this layer.
    pub sock_type: i32,
    /// Protocol family, opaque to this layer.
    pub family: u16,
}

impl AddressAttr {
    /// Serialise into network byte order: `addr_len(u32) + addr + sock_type(i32) + family(u16)`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "addresses are bounded well below u32::MAX by the transport layer"
        )]
        let addr_len = self.addr.len() as u32;
        let mut buf = Vec::with_capacity(4 + self.addr.len() + 4 + 2);
        buf.extend_from_slice(&addr_len.to_be_bytes());
        buf.extend_from_slice(&self.addr);
        #[expect(clippy::cast_sign_loss, reason = "bit pattern preserved")]
        buf.extend_from_slice(&(self.sock_type as u32).to_be_bytes());
        buf.extend_from_slice(&self.family.to_be_bytes());
        buf
    }

    /// Parse from a network-byte-order buffer.
    ///
    /// # Errors
    /// Returns `None` if `buf` is shorter than the declared address length
    /// plus the trailing fixed fields.
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        let mut r = Reader::new(buf);
        let addr_len = usize::try_from(r.try_u32()?).ok()?;
        let addr = r.try_take(addr_len)?.to_vec();
        let sock_type_bits = r.try_u32()?;
        #[expect(clippy::cast_possible_wrap, reason = "bit pattern preserved")]
        let sock_type = sock_type_bits as i32;
        let family = r.try_u16()?;
        Some(Self { addr, sock_type, family })
    }

    /// Serialise into network byte order, then append `port` as a trailing
    /// big-endian `u16` — the format the join/lookup handshake actually puts
    /// on the wire (spec §4.G): the port lives after the whole structured
    /// attribute, not folded into `addr` itself.
    #[must_use]
    pub fn to_bytes_with_port(&self, port: u16) -> Vec<u8> {
        let mut bytes = self.to_bytes();
        bytes.extend_from_slice(&port.to_be_bytes());
        bytes
    }

    /// Parse an [`AddressAttr`] followed by its trailing port field, as
    /// produced by [`Self::to_bytes_with_port`].
    ///
    /// # Errors
    /// Returns `None` if `buf` is shorter than the declared address length
    /// plus the trailing sock_type/family/port fields.
    #[must_use]
    pub fn from_bytes_with_port(buf: &[u8]) -> Option<(Self, u16)> {
        let address = Self::from_bytes(buf)?;
        let consumed = 4 + address.addr.len() + 4 + 2;
        let port_bytes = buf.get(consumed..consumed + 2)?;
        let port = u16::from_be_bytes(port_bytes.try_into().ok()?);
        Some((address, port))
    }

    /// Reconstruct the socket address this attribute plus a separately
    /// parsed `port` describe.
    ///
    /// # Errors
    /// Returns [`NodeError::Proto`] if `family` is not a recognised IPv4/IPv6
    /// tag or `addr` doesn't match the expected byte width for it.
    pub fn socket_addr(&self, port: u16) -> Result<SocketAddr, NodeError> {
        match self.family {
            2 => {
                let octets: [u8; 4] = self.addr.as_slice().try_into().map_err(|_| NodeError::Proto)?;
                Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
            }
            10 => {
                let octets: [u8; 16] = self.addr.as_slice().try_into().map_err(|_| NodeError::Proto)?;
                Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
            }
            _ => Err(NodeError::Proto),
        }
    }
}

/// A tiny fixed-buffer big-endian writer, replacing the source's
/// pointer-arithmetic framing (spec §9 "Pointer-arith into packed buffers").
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self { Self { buf, pos: 0 } }

    fn put_bytes(&mut self, bytes: &[u8]) {
        if let Some(dst) = self.buf.get_mut(self.pos..self.pos + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
        self.pos += bytes.len();
    }

    fn put_u32(&mut self, v: u32) { self.put_bytes(&v.to_be_bytes()); }

    fn put_u64(&mut self, v: u64) { self.put_bytes(&v.to_be_bytes()); }
}

/// A tiny fixed-buffer big-endian reader paired with [`Writer`].
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self { Self { buf, pos: 0 } }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let slice = self.buf.get(self.pos..self.pos + n).unwrap_or(&[]);
        self.pos += n;
        slice
    }

    fn try_take(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.buf.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    fn u32(&mut self) -> u32 {
        let bytes = self.take(4);
        let arr: [u8; 4] = bytes.try_into().unwrap_or([0; 4]);
        u32::from_be_bytes(arr)
    }

    fn u64(&mut self) -> u64 {
        let bytes = self.take(8);
        let arr: [u8; 8] = bytes.try_into().unwrap_or([0; 8]);
        u64::from_be_bytes(arr)
    }

    fn try_u32(&mut self) -> Option<u32> {
        let bytes = self.try_take(4)?;
        let arr: [u8; 4] = bytes.try_into().ok()?;
        Some(u32::from_be_bytes(arr))
    }

    fn try_u16(&mut self) -> Option<u16> {
        let bytes = self.try_take(2)?;
        let arr: [u8; 2] = bytes.try_into().ok()?;
        Some(u16::from_be_bytes(arr))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sample_cmd() -> CmdHeader {
        CmdHeader {
            id: Oid::from_slice(&[1, 2, 3, 4]),
            flags: CmdFlags::NEED_ACK | CmdFlags::MORE,
            status: -2,
            size: 128,
            trans: CmdHeader::reply_trans(7),
        }
    }

    #[test]
    fn cmd_header_round_trips() {
        let hdr = sample_cmd();
        let bytes = hdr.to_bytes();
        assert_eq!(CmdHeader::from_bytes(&bytes), hdr);
    }

    #[test]
    fn cmd_header_involution() {
        let hdr = sample_cmd();
        let once = CmdHeader::from_bytes(&hdr.to_bytes());
        let twice = CmdHeader::from_bytes(&once.to_bytes());
        assert_eq!(once, twice);
    }

    #[test]
    fn reply_bit_round_trips() {
        let hdr = sample_cmd();
        assert!(hdr.is_reply());
        assert_eq!(hdr.trans_number(), 7);
    }

    #[rstest]
    #[case(AttrCommand::Lookup)]
    #[case(AttrCommand::Write)]
    #[case(AttrCommand::Other(9999))]
    fn attr_header_round_trips(#[case] cmd: AttrCommand) {
        let hdr = AttrHeader { cmd, size: 42, flags: 0 };
        let bytes = hdr.to_bytes();
        assert_eq!(AttrHeader::from_bytes(&bytes), hdr);
    }

    #[test]
    fn io_attr_round_trips() {
        let io = IoAttr {
            id: Oid::from_slice(&[9, 9, 9]),
            offset: 1024,
            size: 4096,
            flags: IoFlags::APPEND,
        };
        let bytes = io.to_bytes();
        assert_eq!(IoAttr::from_bytes(&bytes), io);
    }

    #[test]
    fn address_attr_round_trips() {
        let addr = AddressAttr { addr: vec![10, 0, 0, 2, 0x04, 0xd2], sock_type: 1, family: 2 };
        let bytes = addr.to_bytes();
        assert_eq!(AddressAttr::from_bytes(&bytes), Some(addr));
    }

    #[test]
    fn address_attr_rejects_truncation() {
        let mut bytes = AddressAttr { addr: vec![1, 2, 3], sock_type: 1, family: 2 }.to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(AddressAttr::from_bytes(&bytes), None);
    }

    #[test]
    fn address_attr_with_port_round_trips() {
        let addr = AddressAttr { addr: vec![10, 0, 0, 2], sock_type: 1, family: 2 };
        let bytes = addr.to_bytes_with_port(1234);
        let (parsed, port) = AddressAttr::from_bytes_with_port(&bytes).unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(port, 1234);
    }

    #[test]
    fn address_attr_with_port_rejects_truncated_port() {
        let addr = AddressAttr { addr: vec![10, 0, 0, 2], sock_type: 1, family: 2 };
        let mut bytes = addr.to_bytes_with_port(1234);
        bytes.truncate(bytes.len() - 1);
        assert!(AddressAttr::from_bytes_with_port(&bytes).is_none());
    }

    #[test]
    fn socket_addr_reconstructs_v4() {
        let addr = AddressAttr { addr: vec![10, 0, 0, 2], sock_type: 1, family: 2 };
        assert_eq!(addr.socket_addr(1234).unwrap(), "10.0.0.2:1234".parse().unwrap());
    }

    #[test]
    fn socket_addr_reconstructs_v6() {
        let octets = Ipv6Addr::LOCALHOST.octets().to_vec();
        let addr = AddressAttr { addr: octets, sock_type: 1, family: 10 };
        assert_eq!(addr.socket_addr(53).unwrap(), SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 53));
    }

    #[test]
    fn socket_addr_rejects_unknown_family() {
        let addr = AddressAttr { addr: vec![0, 0, 0, 0], sock_type: 1, family: 99 };
        assert!(addr.socket_addr(1).is_err());
    }
}
