use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use worldping::config::{Config, Overrides};
use worldping::{logging, metrics};

mod commands;

use commands::RunOptions;

#[derive(Parser)]
#[command(
    name = "worldping",
    version,
    about = "Scrape the world directory and record latency samples for selected worlds",
    long_about = None
)]
struct Cli {
    /// TOML configuration file (defaults plus WORLDPING_* variables when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration
    #[arg(long)]
    log_format: Option<String>,

    /// Maximum number of probes in flight; overrides the configuration
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the batch summary as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Print Prometheus metrics after the batch
    #[arg(long, default_value = "false")]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        log_format: cli.log_format,
        max_concurrent_probes: cli.concurrency,
    };
    let config = Config::load_with(cli.config.as_deref(), &overrides)?;

    // Held until exit so the file writer flushes
    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    tracing::info!(
        directory = %config.directory.url,
        database = %config.database.sqlite_path.display(),
        concurrency = config.prober.max_concurrent_probes,
        "worldping starting"
    );

    let options = RunOptions {
        json: cli.json,
        print_metrics: cli.print_metrics,
    };

    if let Err(e) = commands::run(config, options).await {
        tracing::error!(error = ?e, "Batch failed");
        return Err(e);
    }

    Ok(())
}
