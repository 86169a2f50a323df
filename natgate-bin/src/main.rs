use anyhow::Result;
use clap::Parser;
use natgate::run_bin;
use tokio::signal;

use log::info;

/// Transparent NAT gateway with an MPTCP egress path
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// YAML config file; built-in addresses are used when omitted
    #[clap(short, long, value_name = "FILE")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    run_bin(args.config.as_deref()).await?;
    info!("Gateway started, press Ctrl-C to stop");

    signal::ctrl_c().await?;
    info!("Ctrl-C received, stopping...");

    Ok(())
}
