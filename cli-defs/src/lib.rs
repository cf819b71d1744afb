//! Shared CLI type definitions for dnode build and runtime.
//!
//! This crate provides CLI argument and configuration types used by both the
//! `build.rs` script (for man page generation) and the runtime binary.
//! Extracting these types into a separate crate avoids brittle `#[path = ...]`
//! includes and keeps build-time and runtime dependencies cleanly separated.

#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![expect(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]

use clap::{Args, Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Default socket address a node binds to when none is supplied.
pub const DEFAULT_BIND: &str = "0.0.0.0:7650";
/// Default storage root when none is supplied.
pub const DEFAULT_ROOT: &str = "dnode-data";
/// Default peer receive timeout, in seconds.
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 10;
/// Default `tracing` env-filter string.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Arguments for the `self-test` administrative subcommand.
#[derive(Parser, Deserialize, Serialize, Default, Debug, Clone)]
pub struct SelfTestArgs {
    /// File to write into the store and read back.
    pub path: Option<String>,
}

/// CLI subcommands exposed by `dnode`.
#[derive(Subcommand, Deserialize, Serialize, Debug, Clone)]
pub enum Commands {
    /// Round-trip a local file through the storage engine.
    #[command(name = "self-test")]
    SelfTest(SelfTestArgs),
}

/// Runtime configuration shared by the binary.
///
/// The default bind address `0.0.0.0:7650` listens on all interfaces.
/// This is convenient for local development, but production deployments
/// should bind to a specific interface (for example `127.0.0.1`) and sit
/// behind a reverse proxy.
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "DNODE_")]
pub struct NodeConfig {
    /// Address this node listens on.
    #[ortho_config(default = DEFAULT_BIND.to_owned())]
    #[arg(long)]
    pub bind: String,
    /// Filesystem directory objects are stored under.
    #[ortho_config(default = DEFAULT_ROOT.to_owned())]
    #[arg(long)]
    pub root: String,
    /// This node's hex-encoded overlay identifier.
    #[ortho_config(default = String::new())]
    #[arg(long)]
    pub node_id: String,
    /// Seconds to wait for a reverse-lookup reply during the join handshake.
    #[ortho_config(default = DEFAULT_JOIN_TIMEOUT_SECS)]
    #[arg(long)]
    pub join_timeout_secs: u64,
    /// `tracing` env-filter directive string.
    #[ortho_config(default = DEFAULT_LOG_FILTER.to_owned())]
    #[arg(long)]
    pub log_filter: String,
    /// Address of an existing peer to bootstrap the overlay from.
    #[ortho_config(default = String::new())]
    #[arg(long)]
    pub peer: String,
}

/// Top-level CLI entry point consumed by the binary.
#[derive(Parser, Serialize)]
pub struct Cli {
    /// CLI configuration overrides (merged with files and defaults at runtime).
    #[command(flatten)]
    pub config: NodeConfig,
    /// Optional subcommand.
    #[command(subcommand)]
    pub command: Option<Commands>,
}
