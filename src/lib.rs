pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use anyhow::Result;
use tracing::debug;

use crate::core::config::AppConfig;
use crate::core::valuation::ValuationMode;

pub enum AppCommand {
    Value {
        symbol: String,
        mode: Option<ValuationMode>,
        years: Option<u32>,
        eps: Option<f64>,
        growth: Option<f64>,
    },
    History,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Value {
            symbol,
            mode,
            years,
            eps,
            growth,
        } => {
            cli::value::run(
                &config,
                &symbol,
                cli::value::Overrides {
                    mode,
                    years,
                    eps,
                    growth,
                },
            )
            .await
        }
        AppCommand::History => cli::history::run(&config),
    }
}
