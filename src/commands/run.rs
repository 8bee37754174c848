use anyhow::{Context, Result};

use worldping::batch::BatchOrchestrator;
use worldping::config::Config;
use worldping::crawler::DirectoryFetcher;
use worldping::error::{Error, WorldpingErrorTrait};
use worldping::metrics;
use worldping::storage::SqliteCatalogStore;

/// Output switches for one run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Print the batch summary as JSON instead of text
    pub json: bool,

    /// Print Prometheus metrics after the batch
    pub print_metrics: bool,
}

/// Fetch the directory, then synchronize and probe in one batch
pub async fn run(config: Config, options: RunOptions) -> Result<()> {
    let fetcher =
        DirectoryFetcher::new(&config.directory).context("Failed to create directory fetcher")?;
    let records = fetcher.fetch_endpoint_records().await;

    let mut store = SqliteCatalogStore::open(&config.database.sqlite_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database.sqlite_path.display()
        )
    })?;

    let orchestrator =
        BatchOrchestrator::from_config(&config.prober).context("Failed to create prober")?;

    let summary = match orchestrator.run(&mut store, records).await {
        Ok(summary) => summary,
        Err(e) => {
            let err = Error::from(e);
            tracing::error!(
                category = %err.category(),
                recoverable = err.is_recoverable(),
                error = %err,
                "Batch rolled back"
            );
            return Err(err).context("Batch rolled back");
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Batch complete");
        println!("==============");
        println!("  Worlds fetched:    {}", summary.fetched);
        println!("  New catalog rows:  {}", summary.new_entries);
        println!("  Probes attempted:  {}", summary.probes_attempted);
        println!("  Probes failed:     {}", summary.probes_failed);
        println!("  Reachability:      {:.1}%", summary.reachability() * 100.0);
    }

    if options.print_metrics {
        let text = metrics::encode_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {e}"))?;
        print!("{text}");
    }

    Ok(())
}
