//! One scrape-and-probe batch inside a single transaction
//!
//! ```text
//! begin ─▶ synchronize ─▶ select ─▶ probe ─▶ insert measurements ─▶ commit
//!                │            │                       │              │
//!                └────────────┴───── any fault ───────┴──────────────┴─▶ rollback
//! ```
//!
//! The catalog snapshot used for selection is the one the synchronizer just
//! wrote, so newly discovered worlds are probed in the same batch.

use crate::catalog::CatalogSynchronizer;
use crate::config::ProberConfig;
use crate::metrics;
use crate::models::{player_counts, BatchSummary, EndpointRecord, SelectionFilter};
use crate::prober::BoundedProber;
use crate::storage::{CatalogStore, CatalogTransaction};
use crate::utils::error::{ProbeError, StorageError};

/// Runs synchronization and probing as one atomic unit
pub struct BatchOrchestrator {
    synchronizer: CatalogSynchronizer,
    prober: BoundedProber,
    filter: SelectionFilter,
}

impl BatchOrchestrator {
    pub fn new(prober: BoundedProber, filter: SelectionFilter) -> Self {
        Self {
            synchronizer: CatalogSynchronizer::new(),
            prober,
            filter,
        }
    }

    /// Build an orchestrator probing over HTTP
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &ProberConfig) -> Result<Self, ProbeError> {
        Ok(Self::new(
            BoundedProber::from_config(config)?,
            config.selection_filter(),
        ))
    }

    pub fn filter(&self) -> &SelectionFilter {
        &self.filter
    }

    /// Run one batch over freshly parsed directory records
    ///
    /// Commits only when every stage succeeded. Any storage fault rolls the
    /// whole batch back and is returned; probe failures never are.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` raised by the store
    pub async fn run<S: CatalogStore>(
        &self,
        store: &mut S,
        records: Vec<EndpointRecord>,
    ) -> Result<BatchSummary, StorageError> {
        let mut tx = store.begin()?;

        let summary = match self.run_stages(&mut tx, &records).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Batch failed, rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback reported an error");
                }
                metrics::record_batch("rolled_back");
                return Err(e);
            }
        };

        if let Err(e) = tx.commit() {
            tracing::error!(error = %e, "Batch commit failed");
            metrics::record_batch("rolled_back");
            return Err(e);
        }
        metrics::record_batch("committed");

        tracing::info!(
            fetched = summary.fetched,
            new_entries = summary.new_entries,
            probed = summary.probes_attempted,
            failed = summary.probes_failed,
            "Fetched {} worlds and pinged {}",
            summary.fetched,
            summary.probes_attempted
        );

        Ok(summary)
    }

    async fn run_stages<T: CatalogTransaction>(
        &self,
        tx: &mut T,
        records: &[EndpointRecord],
    ) -> Result<BatchSummary, StorageError> {
        let report = self.synchronizer.synchronize(tx, records)?;

        let selected = tx.query_catalog_entries(&self.filter)?;
        tracing::info!(selected = selected.len(), "Selected worlds for probing");

        let counts = player_counts(records);
        let batch = self.prober.probe_all(selected, &counts).await;

        let written = tx.insert_measurements(&batch.measurements)?;
        tracing::debug!(written, "Measurements staged");

        Ok(BatchSummary {
            fetched: records.len(),
            new_entries: report.inserted,
            probes_attempted: batch.len(),
            probes_failed: batch.failed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorldTier, SENTINEL_LATENCY};
    use crate::prober::MockProbe;
    use crate::storage::{MockCatalogStore, MockFaults, SqliteCatalogStore};
    use std::sync::Arc;
    use std::time::Duration;

    const URL_301: &str = "http://world301.runescape.com/";

    fn record_301() -> EndpointRecord {
        EndpointRecord::new(
            301,
            "World 301",
            "50 players",
            "United Kingdom",
            WorldTier::Members,
            "-",
        )
    }

    fn orchestrator(probe: MockProbe) -> BatchOrchestrator {
        let prober = BoundedProber::new(Arc::new(probe), 5, Duration::ZERO);
        BatchOrchestrator::new(prober, SelectionFilter::default())
    }

    #[tokio::test]
    async fn test_scenario_301_success() {
        let mut store = SqliteCatalogStore::in_memory().unwrap();
        let probe =
            MockProbe::succeeding(Duration::from_secs(5)).with_latency(URL_301, Duration::from_millis(420));

        let summary = orchestrator(probe)
            .run(&mut store, vec![record_301()])
            .await
            .unwrap();

        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.new_entries, 1);
        assert_eq!(summary.probes_attempted, 1);
        assert_eq!(summary.probes_failed, 0);

        let measurements = store.measurements_for(301).unwrap();
        assert_eq!(measurements.len(), 1);
        assert!((measurements[0].latency_seconds - 0.42).abs() < 1e-9);
        assert_eq!(measurements[0].player_count, 50);
    }

    #[tokio::test]
    async fn test_scenario_301_timeout() {
        let mut store = SqliteCatalogStore::in_memory().unwrap();
        let probe = MockProbe::succeeding(Duration::from_millis(100)).with_timeout(URL_301);

        let summary = orchestrator(probe)
            .run(&mut store, vec![record_301()])
            .await
            .unwrap();

        assert_eq!(summary.probes_failed, 1);
        let measurements = store.measurements_for(301).unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].latency_seconds, SENTINEL_LATENCY);
        assert_eq!(measurements[0].player_count, 50);
    }

    #[tokio::test]
    async fn test_scenario_rerun_adds_no_entries() {
        let mut store = SqliteCatalogStore::in_memory().unwrap();
        let orchestrator = orchestrator(MockProbe::succeeding(Duration::from_millis(100)));

        orchestrator.run(&mut store, vec![record_301()]).await.unwrap();
        let second = orchestrator.run(&mut store, vec![record_301()]).await.unwrap();

        assert_eq!(second.new_entries, 0);
        assert_eq!(store.catalog_count().unwrap(), 1);
        // Every batch still records a sample
        assert_eq!(store.measurement_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_url_collision_does_not_block_later_batches() {
        let world = |id: i64, name: &str| {
            EndpointRecord::new(id, name, "50 players", "United Kingdom", WorldTier::Members, "-")
        };
        let mut store = SqliteCatalogStore::in_memory().unwrap();
        let orchestrator = orchestrator(MockProbe::succeeding(Duration::from_millis(100)));

        orchestrator.run(&mut store, vec![world(5, "World 5")]).await.unwrap();

        for _ in 0..3 {
            let records = vec![world(5, "World 5"), world(6, "World5"), world(7, "World 7")];
            orchestrator.run(&mut store, records).await.unwrap();
        }

        assert_eq!(store.catalog_count().unwrap(), 2);
        assert_eq!(store.measurements_for(5).unwrap().len(), 4);
        assert_eq!(store.measurements_for(7).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unselected_worlds_catalogued_but_not_probed() {
        let mut store = SqliteCatalogStore::in_memory().unwrap();
        let probe = MockProbe::succeeding(Duration::from_millis(100));
        let records = vec![
            record_301(),
            EndpointRecord::new(302, "World 302", "10 players", "United States", WorldTier::Members, "-"),
            EndpointRecord::new(303, "World 303", "10 players", "Germany", WorldTier::Free, "-"),
            EndpointRecord::new(304, "World 304", "10 players", "Germany", WorldTier::Members, "Trade"),
        ];

        let orchestrator = orchestrator(probe);
        let summary = orchestrator.run(&mut store, records).await.unwrap();

        assert_eq!(summary.new_entries, 4);
        assert_eq!(summary.probes_attempted, 1);
        assert_eq!(store.catalog_count().unwrap(), 4);
        assert_eq!(store.measurement_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_no_rows() {
        let mut store = MockCatalogStore::with_faults(MockFaults {
            fail_on_commit: true,
            ..Default::default()
        });

        let result = orchestrator(MockProbe::succeeding(Duration::from_millis(100)))
            .run(&mut store, vec![record_301()])
            .await;

        assert!(matches!(result, Err(StorageError::CommitFailed(_))));
        assert!(store.catalog_entries().is_empty());
        assert!(store.measurements().is_empty());
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_measurement_fault_rolls_back_catalog() {
        let mut store = MockCatalogStore::with_faults(MockFaults {
            fail_on_measurement_insert: true,
            ..Default::default()
        });

        let result = orchestrator(MockProbe::succeeding(Duration::from_millis(100)))
            .run(&mut store, vec![record_301()])
            .await;

        assert!(matches!(result, Err(StorageError::WriteRejected(_))));
        assert!(store.catalog_entries().is_empty());
        assert_eq!(store.rollbacks(), 1);

        // A healthy retry afterwards starts from a clean catalog
        store.set_faults(MockFaults::default());
        let summary = orchestrator(MockProbe::succeeding(Duration::from_millis(100)))
            .run(&mut store, vec![record_301()])
            .await
            .unwrap();
        assert_eq!(summary.new_entries, 1);
        assert_eq!(store.measurements().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_directory_commits_empty_batch() {
        let mut store = MockCatalogStore::new();
        let probe = Arc::new(MockProbe::succeeding(Duration::from_millis(100)));
        let prober = BoundedProber::new(probe.clone(), 5, Duration::ZERO);

        let summary = BatchOrchestrator::new(prober, SelectionFilter::default())
            .run(&mut store, Vec::new())
            .await
            .unwrap();

        assert_eq!(summary, BatchSummary::default());
        assert_eq!(probe.calls(), 0);
        assert_eq!(store.commits(), 1);
    }
}
