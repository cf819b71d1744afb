//! Bitsets carried in frame and IO-attribute headers.
//!
//! Mirrors the teacher's per-session preference bitflags but applied to the
//! overlay's two wire bitsets: [`CmdFlags`] on the command header and
//! [`IoFlags`] on the IO attribute (spec §3, "Framed command" / "IO attribute").

use bitflags::bitflags;

bitflags! {
    /// Flags carried in a `cmd` header.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CmdFlags: u32 {
        /// Requester wants a zero-payload ack after dispatch completes.
        const NEED_ACK = 1 << 0;
        /// More frames follow with the same transaction number (chunked reply).
        const MORE = 1 << 1;
        /// Peer teardown is requested alongside this frame.
        const DESTROY = 1 << 2;
    }
}

impl CmdFlags {
    /// Whether the sender expects a trailing ack frame.
    #[must_use]
    pub const fn needs_ack(self) -> bool { self.contains(Self::NEED_ACK) }

    /// Whether more frames with this transaction number will follow.
    #[must_use]
    pub const fn has_more(self) -> bool { self.contains(Self::MORE) }
}

bitflags! {
    /// Flags carried in an `io_attr`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IoFlags: u32 {
        /// Ignore the supplied offset; the data is append-written.
        const APPEND = 1 << 0;
        /// Record this write in the object's history log.
        const UPDATE = 1 << 1;
    }
}

impl IoFlags {
    /// Whether the write should append rather than seek to `offset`.
    #[must_use]
    pub const fn is_append(self) -> bool { self.contains(Self::APPEND) }

    /// Whether the write should be recorded in the history log.
    #[must_use]
    pub const fn is_update(self) -> bool { self.contains(Self::UPDATE) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_cmd_flags_are_empty() {
        let flags = CmdFlags::default();
        assert!(flags.is_empty());
        assert!(!flags.needs_ack());
        assert!(!flags.has_more());
    }

    #[rstest]
    #[case(CmdFlags::NEED_ACK, 0)]
    #[case(CmdFlags::MORE, 1)]
    #[case(CmdFlags::DESTROY, 2)]
    fn cmd_flag_bit_position(#[case] flag: CmdFlags, #[case] expected_bit: u32) {
        assert_eq!(flag.bits(), 1u32 << expected_bit);
    }

    #[test]
    fn combined_cmd_flags() {
        let flags = CmdFlags::NEED_ACK | CmdFlags::MORE;
        assert!(flags.needs_ack());
        assert!(flags.has_more());
    }

    #[rstest]
    #[case(IoFlags::APPEND, 0)]
    #[case(IoFlags::UPDATE, 1)]
    fn io_flag_bit_position(#[case] flag: IoFlags, #[case] expected_bit: u32) {
        assert_eq!(flag.bits(), 1u32 << expected_bit);
    }

    #[test]
    fn io_flags_helpers() {
        let flags = IoFlags::APPEND | IoFlags::UPDATE;
        assert!(flags.is_append());
        assert!(flags.is_update());
        assert!(!IoFlags::empty().is_append());
    }
}
