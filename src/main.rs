use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ivx::core::log::init_logging;
use ivx::core::valuation::ValuationMode;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn parse_mode(s: &str) -> Result<ValuationMode, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Estimate intrinsic value for a symbol and classify its price
    Value {
        /// Ticker symbol, e.g. AAPL
        symbol: String,
        /// Valuation model: discounted or graham
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ValuationMode>,
        /// Projection horizon in years for the discounted model
        #[arg(long)]
        years: Option<u32>,
        /// Manual trailing EPS, skips EPS providers
        #[arg(long)]
        eps: Option<f64>,
        /// Manual growth estimate in percent, skips growth providers
        #[arg(long)]
        growth: Option<f64>,
    },
    /// Display past evaluations
    History,
}

impl From<Commands> for ivx::AppCommand {
    fn from(cmd: Commands) -> ivx::AppCommand {
        match cmd {
            Commands::Value {
                symbol,
                mode,
                years,
                eps,
                growth,
            } => ivx::AppCommand::Value {
                symbol,
                mode,
                years,
                eps,
                growth,
            },
            Commands::History => ivx::AppCommand::History,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => ivx::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = ivx::core::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
valuation:
  mode: discounted-earnings   # or graham-multiplier
  years: 5
  provider_timeout_secs: 5

thresholds:
  margin_of_safety: 0.20
  lower_multiplier: 0.80
  upper_multiplier: 1.20

providers:
  yahoo:
    base_url: "https://query1.finance.yahoo.com"
  fred:
    base_url: "https://api.stlouisfed.org"
    series_id: "AAA"
    # api_key: set here or via the FRED_API_KEY environment variable
  treasury_symbol: "^TYX"

fallbacks:
  discount_rate_pct: 4.4
  # growth_rate_pct: 10.0   # uncomment to skip the manual prompt when estimates fail
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
