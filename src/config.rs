//! Node configuration, layered from CLI flags, environment, and an optional
//! dotfile (spec §4.I, §6).

use clap::Args;
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

/// Node configuration bundle (spec §6 "A single `config` bundle").
///
/// Loaded via [`ortho_config::OrthoConfig`] with prefix `DNODE_`, merging
/// CLI flags over environment variables over an optional dotfile over
/// these built-in defaults — the same layering the teacher applies to its
/// own `AppConfig`.
#[derive(Args, OrthoConfig, Serialize, Deserialize, Debug, Clone)]
#[ortho_config(prefix = "DNODE_")]
pub struct NodeConfig {
    /// Address this node listens on.
    #[ortho_config(default = DEFAULT_BIND.to_string())]
    #[arg(long, default_value_t = String::from(DEFAULT_BIND))]
    pub bind: String,

    /// Filesystem directory objects are stored under.
    #[ortho_config(default = DEFAULT_ROOT.to_string())]
    #[arg(long, default_value_t = String::from(DEFAULT_ROOT))]
    pub root: String,

    /// This node's hex-encoded overlay identifier. A random identifier is
    /// generated if left unset.
    #[ortho_config(default = String::new())]
    #[arg(long, default_value_t = String::new())]
    pub node_id: String,

    /// Seconds to wait for a reverse-lookup reply during the join
    /// handshake (spec §4.G).
    #[ortho_config(default = DEFAULT_JOIN_TIMEOUT_SECS)]
    #[arg(long, default_value_t = DEFAULT_JOIN_TIMEOUT_SECS)]
    pub join_timeout_secs: u64,

    /// `tracing` env-filter directive string.
    #[ortho_config(default = DEFAULT_LOG_FILTER.to_string())]
    #[arg(long, default_value_t = String::from(DEFAULT_LOG_FILTER))]
    pub log_filter: String,

    /// Address of an existing peer to bootstrap the overlay from. When
    /// set, the node performs a reverse-lookup handshake against this
    /// address on startup, then broadcasts a join to every peer it learns
    /// of (spec §4.G).
    #[ortho_config(default = String::new())]
    #[arg(long, default_value_t = String::new())]
    pub peer: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            root: DEFAULT_ROOT.to_string(),
            node_id: String::new(),
            join_timeout_secs: DEFAULT_JOIN_TIMEOUT_SECS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            peer: String::new(),
        }
    }
}
