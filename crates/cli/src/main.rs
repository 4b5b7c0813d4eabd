use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use arbscan_core::{ConfigLoader, RawListing};
use arbscan_engine::{ArbitrageSignal, Pipeline, RunOutput, UnifiedProduct};

#[derive(Parser)]
#[command(name = "arbscan")]
#[command(about = "Cross-platform prediction-market unification and arbitrage scanner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one unification pass over a batch of scraped listings
    Run {
        /// JSON file holding the raw listings (an array of listing objects)
        #[arg(short, long)]
        input: PathBuf,
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective configuration after file and env merging
    Config {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

/// Report handed to downstream consumers: products, ranked signals, and the
/// run's data-quality diagnostics.
#[derive(Serialize)]
struct Report {
    products: Vec<UnifiedProduct>,
    signals: Vec<ArbitrageSignal>,
    diagnostics: arbscan_core::RunDiagnostics,
}

impl From<RunOutput> for Report {
    fn from(output: RunOutput) -> Self {
        Self {
            products: output.products,
            signals: output.signals,
            diagnostics: output.diagnostics,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            input,
            config,
            output,
            pretty,
        } => {
            run_scan(&input, &config, output.as_deref(), pretty).await?;
        }
        Commands::Config { config } => {
            let config = ConfigLoader::load_from(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run_scan(
    input: &std::path::Path,
    config_path: &str,
    output: Option<&std::path::Path>,
    pretty: bool,
) -> anyhow::Result<()> {
    let config = ConfigLoader::load_from(config_path)?;

    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("reading listings from {}", input.display()))?;
    let listings: Vec<RawListing> =
        serde_json::from_str(&raw).context("parsing raw listing JSON")?;
    info!(listings = listings.len(), input = %input.display(), "loaded listings");

    let pipeline = Pipeline::new(config);
    let report: Report = pipeline.run(listings).await?.into();

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(report = %path.display(), "report written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
