//! Ties the CLI, the config file, and the logger together before the
//! accept loop starts: `httproxy [config-path]`, defaulting to
//! `config/proxy_config.json`.

use std::path::PathBuf;

use anyhow::Result;

use crate::cmd::Args;
use crate::config::Config;
use crate::logging;

pub struct Bootstrap {
    pub config: Config,
    pub config_path: PathBuf,
}

pub fn init() -> Result<Bootstrap> {
    let (mut args, reminder) = Args::parse()?;

    if args.help.is_some_and(|h| h) {
        println!("{}", Args::help());
        std::process::exit(0);
    }

    let config_path = reminder
        .into_iter()
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/proxy_config.json"));

    let config = Config::load(&config_path)?;

    let log_level = args
        .log_level
        .take()
        .map(|level| level.to_string())
        .unwrap_or_else(|| "info".to_string());

    logging::init(&log_level, &config.log_file, args.colored.unwrap_or(false))?;

    log::info!("Loaded configuration from {}", config_path.display());

    Ok(Bootstrap { config, config_path })
}
