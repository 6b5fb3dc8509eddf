use streakboard::logger::*;
use streakboard::settings::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap()?;
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    // $ cargo run --bin logger_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig::from(&settings.log))?;
    trace!(filter = %settings.log.filter, "application trace log");
    debug!(filter = %settings.log.filter, "application debug log");
    info!(filter = %settings.log.filter, "application info log");

    Ok(())
}
