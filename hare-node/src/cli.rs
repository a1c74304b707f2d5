use std::path::PathBuf;

use clap::Parser;

/// Runs one hare layer over an in-process gossip network and reports what
/// an observing node concluded.
#[derive(Debug, Parser)]
#[command(name = "hare-node", version)]
pub struct NodeArgs {
    /// JSON config file; defaults are used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of simulated committee members.
    #[arg(long, default_value_t = 4)]
    pub peers: usize,

    #[arg(long, default_value_t = 1)]
    pub layer: u32,

    /// Make the leader send two different proposals.
    #[arg(long)]
    pub equivocate: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info,hare_consensus=debug")]
    pub log: String,
}
