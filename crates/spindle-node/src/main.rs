//! Spindle Node - vehicular anti-entropy gossip.
//!
//! Entry point for running a single gossip node over TCP.

use anyhow::Context;
use clap::Parser;
use spindle_node::config::{parse_key_value, parse_peer};
use spindle_node::observability::init_logging;
use spindle_node::{GossipNode, NodeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Spindle Node - pairwise gossip between vehicles
#[derive(Parser, Debug)]
#[command(name = "spindle-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node identity
    #[arg(long)]
    node_id: Option<String>,

    /// Listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Peer as id=host:port (repeatable)
    #[arg(long = "peer", value_parser = parse_peer)]
    peers: Vec<(String, SocketAddr)>,

    /// Keep initiating gossip sessions
    #[arg(long)]
    lead: bool,

    /// Seed a local entry as key=value (repeatable)
    #[arg(long = "set", value_parser = parse_key_value)]
    entries: Vec<(String, String)>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(node_id) = &self.node_id {
            config.node_id = node_id.clone();
        }
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        for (id, addr) in &self.peers {
            config.peers.insert(id.clone(), *addr);
        }
        if self.lead {
            config.lead = true;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        NodeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_logging(&config.log_level, config.log_format());

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Spindle node");

    let node = GossipNode::start(&config)
        .await
        .context("failed to start node")?;

    for (key, value) in &args.entries {
        node.store().put(key.clone(), value.clone());
    }

    tracing::info!(
        node = %node.id(),
        addr = %node.local_addr(),
        "Node is ready. Press Ctrl+C to stop."
    );

    let report_every = Duration::from_secs(config.report_interval_secs.max(1));
    let mut report = tokio::time::interval(report_every);
    report.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            _ = report.tick(), if config.report_interval_secs > 0 => {
                tracing::info!(
                    node = %node.id(),
                    keys = node.store().len(),
                    pending = node.store().pending_len(),
                    "store summary"
                );
            }
        }
    }

    tracing::info!("Shutting down");
    let stats = node.shutdown().await?;
    tracing::info!(
        leads = stats.leads_sent,
        follows = stats.follows,
        commits = stats.commits,
        aborts = stats.aborts,
        "Node stopped"
    );
    Ok(())
}
