mod cli;
mod runtime;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hare_common::LayerId;
use hare_consensus::HareConfig;

use crate::cli::NodeArgs;
use crate::runtime::{run_layer, Scenario};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = NodeArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log)),
        )
        .init();

    let config = match &args.config {
        Some(path) => HareConfig::load_from_file(path)?,
        None => HareConfig::default(),
    };
    info!(?config, "hare config loaded");

    let scenario = Scenario {
        layer: LayerId(args.layer),
        peers: args.peers,
        equivocate: args.equivocate,
    };
    match run_layer(&config, &scenario).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            error!("layer {} failed: {e}", args.layer);
            Err(e.into())
        }
    }
}
