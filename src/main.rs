use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dnode::client;
use dnode::config::NodeConfig;
use dnode::node::Node;
use dnode::oid::Oid;
use dnode::transform::TransformRegistry;

/// A one-shot local smoke test: write a file into the store, then read it
/// back and compare.
#[derive(Parser, Debug, Clone)]
struct SelfTestArgs {
    /// File to write into the store and read back.
    path: Utf8PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Round-trip a local file through the storage engine without opening a
    /// socket, to sanity-check a node's configuration.
    SelfTest(SelfTestArgs),
}

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    config: NodeConfig,
    #[command(subcommand)]
    command: Option<Commands>,
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    }
}

fn resolve_node_id(cfg: &NodeConfig) -> Result<Oid> {
    if cfg.node_id.is_empty() {
        let mut buf = [0u8; dnode::oid::ID_SIZE];
        rand::Rng::fill(&mut rand::thread_rng(), &mut buf);
        Ok(Oid::from_slice(&buf))
    } else {
        Oid::from_hex(&cfg.node_id).map_err(|e| anyhow::anyhow!("invalid --node-id hex string: {e}"))
    }
}

fn run_self_test(cfg: &NodeConfig, args: &SelfTestArgs) -> Result<()> {
    let root = Utf8PathBuf::from(&cfg.root);
    let storage = dnode::storage::StorageRoot::open(&root)?;
    let mut registry = TransformRegistry::with_default_transforms();

    let content_id = client::write_file(&mut registry, &storage, &args.path)?;
    let dest = args.path.with_extension("roundtrip");
    client::read_file(&mut registry, &storage, &args.path, &dest, 0, 0)?;

    println!("wrote content id {content_id}, round-tripped to {dest}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.config;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(Commands::SelfTest(args)) = &cli.command {
        return run_self_test(&cfg, args);
    }

    let node_id = resolve_node_id(&cfg)?;
    let addr: SocketAddr = cfg.bind.parse()?;
    let root = Utf8PathBuf::from(&cfg.root);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, %node_id, "dnode listening");

    let node = Arc::new(Node::new(node_id, addr, &root)?);

    if !cfg.peer.is_empty() {
        let bootstrap_addr: SocketAddr = cfg.peer.parse()?;
        let timeout = std::time::Duration::from_secs(cfg.join_timeout_secs);
        if let Err(e) = node.bootstrap_join(bootstrap_addr, timeout).await {
            tracing::warn!(error = %e, "failed to bootstrap into overlay");
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let serve = node.serve(listener, shutdown_rx);
    tokio::pin!(serve);
    let signal = shutdown_signal();
    tokio::pin!(signal);

    tokio::select! {
        () = &mut serve => {}
        () = &mut signal => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            serve.await;
        }
    }
    Ok(())
}
