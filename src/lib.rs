pub mod cli;
pub mod core;
pub mod providers;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::ConversionService;
use crate::core::config::AppConfig;
use crate::providers::ExchangeRateApiProvider;

pub enum AppCommand {
    Currencies,
    Convert {
        amount: String,
        from: String,
        to: Vec<String>,
        swap: bool,
    },
}

/// Builds the conversion service from config, applying an optional API key override.
pub fn build_service(config: AppConfig, api_key: Option<String>) -> Result<ConversionService> {
    config.validate()?;
    let config = config.with_api_key(api_key);
    let provider = ExchangeRateApiProvider::new(
        &config.provider.base_url,
        config.api_key()?,
        Duration::from_secs(config.provider.timeout_secs),
    )?;
    Ok(ConversionService::new(Arc::new(provider)))
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    api_key: Option<String>,
) -> Result<()> {
    info!("Currency converter starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.provider.base_url,
        timeout_secs = config.provider.timeout_secs,
        "Loaded config"
    );

    let service = build_service(config, api_key)?;

    match command {
        AppCommand::Currencies => cli::currencies::run(&service).await,
        AppCommand::Convert {
            amount,
            from,
            to,
            swap,
        } => cli::convert::run(&service, &amount, &from, &to, swap).await,
    }
}
