//! HTML parsing and data extraction
//!
//! This module handles parsing the world directory page and extracting
//! structured endpoint records.

pub mod directory;
pub mod selectors;

// Re-export main parser and public types
pub use directory::DirectoryParser;
pub use selectors::{DirectoryColumn, DirectorySelectors};
