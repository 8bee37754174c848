//! Catalog synchronization
//!
//! Merges freshly parsed directory records into the persistent catalog
//! without ever duplicating a world.

pub mod synchronizer;

pub use synchronizer::{CatalogSynchronizer, SyncReport};
