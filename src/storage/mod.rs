//! Catalog and measurement persistence
//!
//! SQLite holds two tables: the deduplicated `catalog` of known worlds and the
//! append-only `measurements` time series. All writes go through scoped
//! transactions handed out by a [`CatalogStore`].

pub mod repository;

pub use repository::{
    CatalogStore, CatalogTransaction, MockCatalogStore, MockFaults, MockTransaction,
    SqliteCatalogStore, SqliteTransaction,
};
