//! World directory crawling
//!
//! This module fetches the published server list with rate limiting and
//! turns it into endpoint records for the batch orchestrator.

pub mod fetcher;

pub use fetcher::DirectoryFetcher;
