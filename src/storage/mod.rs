//! Content-addressed object storage engine (spec §4.E).

pub mod object;
pub mod paths;

pub use object::{MAX_READ_TRANS_SIZE, ReadChunk, read_object, write_object};
pub use paths::StorageRoot;
