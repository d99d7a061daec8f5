use anyhow::Context;
use clap::Parser;
use sluice_core::config::SluiceConfig;
use sluice_core::{linked_feeder, logging, replay_file};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Replays one saved input through the linked target, outside the fuzzing loop.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// File holding the input to replay.
    #[clap(value_parser)]
    input: PathBuf,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let (config, config_error) = SluiceConfig::discover_or_default();
    logging::init(&config.logging);
    if let Some(e) = config_error {
        warn!("{e:#}; using built-in defaults");
    }

    let feeder = linked_feeder();
    let report = replay_file(&cli.input, &feeder, &mut std::io::stdout().lock())
        .with_context(|| format!("Cannot replay {:?}", cli.input))?;
    debug!(?report, "replay finished");
    Ok(())
}
