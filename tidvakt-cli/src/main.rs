//! ## tidvakt-cli
//! Offline helpers around the virtual clock: shift the timestamps of a saved
//! response body or HAR recording as if virtual time had passed, and check
//! how a duration expression parses.

use clap::Parser;
use tidvakt_config::TidvaktConfig;
use tidvakt_telemetry::logging::EventLogger;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TidvaktConfig::load()?;
    EventLogger::init(&config.telemetry.log_level);

    match cli.command {
        Commands::Shift(args) => commands::run_shift(args, config).await,
        Commands::Duration(args) => commands::run_duration(args),
    }
}
