//! Existence-gated catalog inserts
//!
//! A record becomes a catalog entry only the first time its world id is seen.
//! Later observations of the same id are no-ops, so running the synchronizer
//! twice over the same directory inserts nothing the second time.

use std::collections::HashSet;

use crate::metrics;
use crate::models::{CatalogEntry, EndpointRecord};
use crate::storage::CatalogTransaction;
use crate::utils::error::StorageError;

/// Counts from one synchronization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries written to the catalog
    pub inserted: usize,

    /// Records whose world id was already catalogued (or repeated in the input)
    pub existing: usize,

    /// Records skipped because they could not be mapped onto the catalog
    pub malformed: usize,
}

/// Stages and writes catalog entries for unseen worlds
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogSynchronizer;

impl CatalogSynchronizer {
    pub fn new() -> Self {
        Self
    }

    /// Insert a catalog entry for every record whose world id is unknown
    ///
    /// Malformed records are logged and skipped. All staged entries are
    /// written through `tx` in one batch; nothing is committed here.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a lookup or the batch insert fails
    pub fn synchronize<T: CatalogTransaction>(
        &self,
        tx: &mut T,
        records: &[EndpointRecord],
    ) -> Result<SyncReport, StorageError> {
        let mut report = SyncReport::default();
        let mut staged: Vec<CatalogEntry> = Vec::new();
        let mut staged_ids: HashSet<i64> = HashSet::new();
        let mut staged_urls: HashSet<String> = HashSet::new();

        for record in records {
            let entry = match CatalogEntry::from_record(record) {
                Ok(entry) => entry,
                Err(e) => {
                    report.malformed += 1;
                    tracing::error!(
                        world_id = record.numeric_id,
                        name = %record.name,
                        error = %e,
                        "Invalid world data"
                    );
                    continue;
                }
            };

            if staged_ids.contains(&entry.numeric_id)
                || tx.find_catalog_entry(entry.numeric_id)?.is_some()
            {
                report.existing += 1;
                continue;
            }

            // Two names that compact to the same host would collide on url
            if staged_urls.contains(&entry.url) {
                report.malformed += 1;
                tracing::warn!(
                    world_id = entry.numeric_id,
                    url = %entry.url,
                    "Skipping world whose url is already staged"
                );
                continue;
            }
            if let Some(owner) = tx.find_catalog_entry_by_url(&entry.url)? {
                report.malformed += 1;
                tracing::warn!(
                    world_id = entry.numeric_id,
                    owner_id = owner.numeric_id,
                    url = %entry.url,
                    "Skipping world whose url is already catalogued"
                );
                continue;
            }

            staged_urls.insert(entry.url.clone());

            staged_ids.insert(entry.numeric_id);
            staged.push(entry);
        }

        report.inserted = tx.insert_catalog_entries(&staged)?;
        metrics::record_catalog_inserts(report.inserted);

        tracing::info!(
            inserted = report.inserted,
            existing = report.existing,
            malformed = report.malformed,
            "Data inserted for {} worlds",
            report.inserted
        );

        Ok(report)
    }
}
