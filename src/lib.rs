//! worldping - Game world directory scraper and latency prober
//!
//! Scrapes the public world directory, keeps a deduplicated catalog of every
//! world ever seen, and records a latency and population sample for each
//! selected world on every run.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Directory page fetching with rate limiting
//! - [`parser`] - HTML parsing of the world directory
//! - [`models`] - Core data structures and types
//! - [`catalog`] - Deduplicating catalog synchronization
//! - [`prober`] - Bounded-concurrency latency probing
//! - [`batch`] - Transactional batch orchestration
//! - [`storage`] - Catalog and measurement persistence (SQLite)
//! - [`logging`] - Tracing subscriber with a rolling log file
//! - [`metrics`] - Prometheus counters and histograms
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use worldping::batch::BatchOrchestrator;
//! use worldping::config::Config;
//! use worldping::crawler::DirectoryFetcher;
//! use worldping::storage::SqliteCatalogStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let fetcher = DirectoryFetcher::new(&config.directory)?;
//!     let records = fetcher.fetch_endpoint_records().await;
//!
//!     let mut store = SqliteCatalogStore::open(&config.database.sqlite_path)?;
//!     let summary = BatchOrchestrator::from_config(&config.prober)?
//!         .run(&mut store, records)
//!         .await?;
//!     println!("{summary:?}");
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod catalog;
pub mod config;
pub mod crawler;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod prober;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::BatchOrchestrator;
    pub use crate::catalog::{CatalogSynchronizer, SyncReport};
    pub use crate::config::Config;
    pub use crate::crawler::DirectoryFetcher;
    pub use crate::error::{Error, ErrorCategory, Result, WorldpingErrorTrait};
    pub use crate::models::{
        BatchSummary, CatalogEntry, EndpointRecord, Measurement, SelectionFilter, WorldTier,
    };
    pub use crate::prober::{BoundedProber, HttpProbe, Probe};
    pub use crate::storage::{CatalogStore, CatalogTransaction, SqliteCatalogStore};
}

// Direct re-exports for convenience
pub use models::{BatchSummary, CatalogEntry, EndpointRecord, Measurement};
