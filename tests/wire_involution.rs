//! Property tests for the header converters' round-trip invariant (spec §8
//! "encode/decode is an involution for every header type").

use dnode::flags::{CmdFlags, IoFlags};
use dnode::oid::Oid;
use dnode::wire::header::{AttrHeader, CmdHeader, IoAttr};
use proptest::prelude::*;

proptest! {
    #[test]
    fn cmd_header_round_trips(
        id_bytes in prop::array::uniform32(any::<u8>()),
        flags_bits in 0u32..8,
        status in any::<i32>(),
        size in any::<u64>(),
        trans in any::<u64>(),
    ) {
        let header = CmdHeader {
            id: Oid::from_slice(&id_bytes),
            flags: CmdFlags::from_bits_truncate(flags_bits),
            status,
            size,
            trans,
        };
        let decoded = CmdHeader::from_bytes(&header.to_bytes());
        prop_assert_eq!(decoded.id, header.id);
        prop_assert_eq!(decoded.flags, header.flags);
        prop_assert_eq!(decoded.status, header.status);
        prop_assert_eq!(decoded.size, header.size);
        prop_assert_eq!(decoded.trans, header.trans);
    }

    #[test]
    fn attr_header_round_trips(cmd_code in 0u32..8, size in any::<u32>(), flags in any::<u32>()) {
        let header = AttrHeader { cmd: cmd_code.into(), size, flags };
        let decoded = AttrHeader::from_bytes(&header.to_bytes());
        prop_assert_eq!(decoded.size, header.size);
        prop_assert_eq!(decoded.flags, header.flags);
    }

    #[test]
    fn io_attr_round_trips(
        id_bytes in prop::array::uniform32(any::<u8>()),
        offset in any::<u64>(),
        size in any::<u64>(),
        flags_bits in 0u32..4,
    ) {
        let io = IoAttr {
            id: Oid::from_slice(&id_bytes),
            offset,
            size,
            flags: IoFlags::from_bits_truncate(flags_bits),
        };
        let decoded = IoAttr::from_bytes(&io.to_bytes());
        prop_assert_eq!(decoded.id, io.id);
        prop_assert_eq!(decoded.offset, io.offset);
        prop_assert_eq!(decoded.size, io.size);
        prop_assert_eq!(decoded.flags, io.flags);
    }
}
