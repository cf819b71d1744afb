//! Attribute-stream walking over a received command payload (spec §4.F).

use super::header::{ATTR_HEADER_LEN, AttrHeader};
use crate::error::NodeError;

/// One attribute parsed out of a command payload, with its body borrowed
/// from the original buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr<'a> {
    /// The attribute's header.
    pub header: AttrHeader,
    /// The attribute's body, exactly `header.size` bytes.
    pub body: &'a [u8],
}

/// Iterator over the attributes in a command payload.
///
/// Mirrors the dispatcher loop in spec §4.F: each step requires enough
/// remaining bytes for a header, then enough for the declared body size.
/// Either shortfall is a protocol error and the walk stops, matching
/// "Parse rejects truncation" (spec §8).
pub struct AttrWalk<'a> {
    remaining: &'a [u8],
    errored: bool,
}

impl<'a> AttrWalk<'a> {
    /// Begin walking the attribute stream in `payload`.
    #[must_use]
    pub const fn new(payload: &'a [u8]) -> Self { Self { remaining: payload, errored: false } }
}

impl<'a> Iterator for AttrWalk<'a> {
    type Item = Result<Attr<'a>, NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored || self.remaining.is_empty() {
            return None;
        }
        let Some(hdr_bytes) = self.remaining.get(..ATTR_HEADER_LEN) else {
            self.errored = true;
            return Some(Err(NodeError::Proto));
        };
        let Ok(hdr_arr): Result<[u8; ATTR_HEADER_LEN], _> = hdr_bytes.try_into() else {
            self.errored = true;
            return Some(Err(NodeError::Proto));
        };
        let header = AttrHeader::from_bytes(&hdr_arr);
        let after_header = self.remaining.get(ATTR_HEADER_LEN..).unwrap_or(&[]);
        let size = header.size as usize;
        let Some(body) = after_header.get(..size) else {
            self.errored = true;
            return Some(Err(NodeError::Proto));
        };
        self.remaining = after_header.get(size..).unwrap_or(&[]);
        Some(Ok(Attr { header, body }))
    }
}
