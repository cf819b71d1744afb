//! Attribute operation selectors carried in `attr.cmd` (spec §6).

/// The operation selector carried in an attribute header.
///
/// Round-trips through `u32` the same way the teacher's field identifiers
/// round-trip through `u16`: known values map to named variants, anything
/// else is preserved in [`AttrCommand::Other`] so the dispatcher can still
/// report a protocol error without losing the offending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrCommand {
    /// Reply with the peer responsible for the addressed OID.
    Lookup,
    /// Reply with this node's own OID and address.
    ReverseLookup,
    /// Register the sender as a peer using the carried address.
    Join,
    /// Store data under the addressed OID.
    Write,
    /// Retrieve data stored under the addressed OID.
    Read,
    /// Enumerate locally stored OIDs.
    List,
    /// Any value not explicitly covered above.
    Other(u32),
}

impl From<u32> for AttrCommand {
    fn from(v: u32) -> Self {
        match v {
            1 => Self::Lookup,
            2 => Self::ReverseLookup,
            3 => Self::Join,
            4 => Self::Write,
            5 => Self::Read,
            6 => Self::List,
            other => Self::Other(other),
        }
    }
}

impl From<AttrCommand> for u32 {
    fn from(c: AttrCommand) -> Self {
        match c {
            AttrCommand::Lookup => 1,
            AttrCommand::ReverseLookup => 2,
            AttrCommand::Join => 3,
            AttrCommand::Write => 4,
            AttrCommand::Read => 5,
            AttrCommand::List => 6,
            AttrCommand::Other(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, AttrCommand::Lookup)]
    #[case(2, AttrCommand::ReverseLookup)]
    #[case(3, AttrCommand::Join)]
    #[case(4, AttrCommand::Write)]
    #[case(5, AttrCommand::Read)]
    #[case(6, AttrCommand::List)]
    #[case(999, AttrCommand::Other(999))]
    fn round_trips_through_u32(#[case] wire: u32, #[case] expected: AttrCommand) {
        let parsed = AttrCommand::from(wire);
        assert_eq!(parsed, expected);
        assert_eq!(u32::from(parsed), wire);
    }
}
