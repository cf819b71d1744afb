//! Wire codec: fixed headers, attribute-stream walking, and framed I/O
//! (spec §4.A).

pub mod frame;
pub mod header;
pub mod io;

pub use frame::{Attr, AttrWalk};
pub use header::{AddressAttr, AttrHeader, CmdHeader, IoAttr};
