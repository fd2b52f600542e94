use anyhow::Result;
use clap::Parser;
use kickmates_client::cli::{self, Args};
use kickmates_client::config::KickmatesConfig;
use kickmates_client::telemetry;

fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(args.verbose);

    let config = KickmatesConfig::from_env()?;
    tracing::debug!(api_url = %config.api_url, "configuration loaded");

    cli::run(args, config)
}
