use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use rs_transmitter::cli::Args;
use rs_transmitter::config::{Credentials, Settings};
use rs_transmitter::models::FileDetails;
use rs_transmitter::transmitter::Client;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    let settings = Settings::from_yaml_file(&args.settings)?;
    let credentials = Credentials::from_yaml_file(&args.credentials)?;

    let details = FileDetails {
        source_filename: args.source.clone(),
        destination_filename: args.destination,
        file_suffix: args.suffix,
        payload_type: args.payload,
    };

    let client = Client::new(settings, credentials)?;

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    runtime.block_on(client.send_file(&details))?;

    info!("Transfer of {} completed", args.source.display());
    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}
