use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tdrs::FileFeed;
use tdrs_models::config::TdrsConfig;
use tdrs_models::progress::ProgressEvent;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tdrs", about = "Ticker Debate Recommendation System")]
struct Cli {
    /// Ticker symbol to analyze (e.g. NVDA)
    ticker: String,

    /// Analysis as-of date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config/tdrs.toml")]
    config: String,

    /// Directory of frozen JSON data snapshots
    #[arg(long, default_value = "data/feeds")]
    data_dir: String,

    /// Override bull/bear debate rounds
    #[arg(long)]
    rounds: Option<u32>,

    /// Override risk debate rounds
    #[arg(long)]
    risk_rounds: Option<u32>,

    /// Disable the three-way risk debate (legacy validator mode)
    #[arg(long)]
    no_risk: bool,

    /// Disable memory queries and persistence for this run
    #[arg(long)]
    no_memory: bool,

    /// Include the social sentiment analyst
    #[arg(long)]
    social: bool,

    /// Print progress events as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

fn load_config(path: &str) -> Result<TdrsConfig> {
    if !Path::new(path).exists() {
        return Ok(TdrsConfig::default());
    }
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config: {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(rounds) = cli.rounds {
        config.run.max_debate_rounds = rounds;
    }
    if let Some(rounds) = cli.risk_rounds {
        config.run.max_risk_debate_rounds = rounds;
    }
    if cli.no_risk {
        config.run.risk_on = false;
    }
    if cli.no_memory {
        config.run.memory_on = false;
    }
    if cli.social {
        config.run.social_on = true;
    }

    let as_of = cli.as_of.unwrap_or_else(|| chrono::Utc::now().date_naive());

    let feed = Arc::new(FileFeed::new(&cli.data_dir));
    let orchestrator = tdrs::build_orchestrator(&config, feed);

    let progress_tx = if cli.progress {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{line}");
                }
            }
        });
        Some(tx)
    } else {
        None
    };

    let summary = orchestrator
        .run(&cli.ticker, as_of, config.run.clone(), progress_tx)
        .await
        .map_err(|e| anyhow::anyhow!("Analysis failed: {e}"))?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{output}");

    Ok(())
}
