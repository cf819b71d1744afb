//! Core library for a distributed, content-addressed object store node.
//!
//! A node accepts connections from peers and clients, speaks a fixed-size
//! binary command protocol built from a command header followed by a
//! stream of typed attributes, and stores objects under filesystem paths
//! derived from their hex-encoded object id. Content ids are produced by a
//! pluggable chain of transforms (currently BLAKE3 and SHA-256) tried in
//! registration order.

#![cfg_attr(
    test,
    expect(clippy::big_endian_bytes, reason = "network protocol uses big-endian")
)]
#![cfg_attr(test, expect(clippy::str_to_string, reason = "test code"))]
#![cfg_attr(test, expect(clippy::unwrap_used, reason = "test code can panic"))]
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "test code with known bounds")
)]
#![cfg_attr(test, expect(clippy::shadow_reuse, reason = "test code shadowing"))]
#![cfg_attr(
    test,
    expect(clippy::let_underscore_must_use, reason = "test cleanup code")
)]
#![cfg_attr(
    test,
    expect(clippy::unneeded_field_pattern, reason = "test pattern matching")
)]

pub mod attr_cmd;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod flags;
pub mod join;
pub mod node;
pub mod oid;
pub mod peer;
pub mod storage;
pub mod transform;
pub mod txn;
pub mod wire;
