//! End-to-end batch tests: mock directory page, SQLite file, scripted probes

mod common;

use common::{directory_page, members_record, world_url, Row};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use worldping::batch::BatchOrchestrator;
use worldping::crawler::DirectoryFetcher;
use worldping::models::{SelectionFilter, SENTINEL_LATENCY};
use worldping::prober::{BoundedProber, MockProbe};
use worldping::storage::SqliteCatalogStore;

async fn serve_directory(rows: &[Row<'_>]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slu"))
        .respond_with(ResponseTemplate::new(200).set_body_string(directory_page(rows)))
        .mount(&server)
        .await;
    server
}

fn orchestrator(probe: MockProbe) -> BatchOrchestrator {
    let prober = BoundedProber::new(Arc::new(probe), 5, Duration::ZERO);
    BatchOrchestrator::new(prober, SelectionFilter::default())
}

#[tokio::test]
async fn test_directory_to_database() {
    let server = serve_directory(&[
        Row { id: 301, players: "50 players", location: "United Kingdom", tier: "Members", activity: "-" },
        Row { id: 302, players: "1,203 players", location: "Germany", tier: "Members", activity: "-" },
        Row { id: 308, players: "FULL", location: "Germany", tier: "Free", activity: "-" },
        Row { id: 420, players: "12 players", location: "United States", tier: "Members", activity: "-" },
    ])
    .await;

    let fetcher =
        DirectoryFetcher::with_config(&format!("{}/slu", server.uri()), 10, Duration::from_secs(5))
            .unwrap();
    let records = fetcher.fetch_endpoint_records().await;
    assert_eq!(records.len(), 4);

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("world_data.db");
    let mut store = SqliteCatalogStore::open(&db_path).unwrap();

    let probe = MockProbe::succeeding(Duration::from_millis(120))
        .with_latency(world_url(301), Duration::from_millis(420))
        .with_timeout(world_url(302));

    let summary = orchestrator(probe).run(&mut store, records).await.unwrap();

    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.new_entries, 4);
    assert_eq!(summary.probes_attempted, 2);
    assert_eq!(summary.probes_failed, 1);

    drop(store);
    let store = SqliteCatalogStore::open(&db_path).unwrap();
    assert_eq!(store.catalog_count().unwrap(), 4);
    assert_eq!(store.measurement_count().unwrap(), 2);

    let m301 = store.measurements_for(301).unwrap();
    assert!((m301[0].latency_seconds - 0.42).abs() < 1e-9);
    assert_eq!(m301[0].player_count, 50);

    let m302 = store.measurements_for(302).unwrap();
    assert_eq!(m302[0].latency_seconds, SENTINEL_LATENCY);
    // First digit run only
    assert_eq!(m302[0].player_count, 1);
}

#[tokio::test]
async fn test_rerun_is_idempotent_for_catalog() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("world_data.db");
    let orchestrator = orchestrator(MockProbe::succeeding(Duration::from_millis(100)));

    for run in 0..3 {
        let mut store = SqliteCatalogStore::open(&db_path).unwrap();
        let summary = orchestrator
            .run(&mut store, vec![members_record(301, "50 players")])
            .await
            .unwrap();
        assert_eq!(summary.new_entries, usize::from(run == 0));
    }

    let store = SqliteCatalogStore::open(&db_path).unwrap();
    assert_eq!(store.catalog_count().unwrap(), 1);
    assert_eq!(store.measurement_count().unwrap(), 3);
}

#[tokio::test]
async fn test_unreachable_directory_commits_nothing_new() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let fetcher =
        DirectoryFetcher::with_config(&format!("{}/slu", server.uri()), 10, Duration::from_secs(5))
            .unwrap();
    let records = fetcher.fetch_endpoint_records().await;
    assert!(records.is_empty());

    let mut store = SqliteCatalogStore::in_memory().unwrap();
    let summary = orchestrator(MockProbe::succeeding(Duration::from_millis(100)))
        .run(&mut store, records)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 0);
    assert_eq!(store.catalog_count().unwrap(), 0);
    assert_eq!(store.measurement_count().unwrap(), 0);
}

#[tokio::test]
async fn test_known_worlds_probed_when_directory_empty() {
    let mut store = SqliteCatalogStore::in_memory().unwrap();
    let orchestrator = orchestrator(MockProbe::succeeding(Duration::from_millis(100)));

    orchestrator
        .run(&mut store, vec![members_record(301, "50 players")])
        .await
        .unwrap();

    // Selection reads the catalog, not the fetched page
    let summary = orchestrator.run(&mut store, Vec::new()).await.unwrap();
    assert_eq!(summary.probes_attempted, 1);

    let samples = store.measurements_for(301).unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[1].player_count, 0);
}
