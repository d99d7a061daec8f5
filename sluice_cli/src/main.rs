use sluice_core::config::SluiceConfig;
use sluice_core::{Bootstrap, CommandEngine, DefaultBootstrap, logging};
use std::process::ExitCode;
use tracing::warn;

fn main() -> Result<ExitCode, anyhow::Error> {
    let (config, config_error) = SluiceConfig::discover_or_default();
    logging::init(&config.logging);
    if let Some(e) = config_error {
        warn!("{e:#}; using built-in defaults");
    }

    let engine = CommandEngine::new(config.engine);
    let stdout = std::io::stdout().lock();
    let status = DefaultBootstrap::new(engine, stdout).run(std::env::args_os().collect())?;
    Ok(ExitCode::from(status))
}
