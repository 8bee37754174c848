// Core data structures for the worldping scraper

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::utils::error::ParseError;
use crate::utils::{extract_first_number, world_url};

/// Latency recorded for a probe that got no response
pub const SENTINEL_LATENCY: f64 = 9999.0;

/// Activity marker the directory shows for worlds without a special activity
pub const IDLE_ACTIVITY: &str = "-";

/// Player counts keyed by world id, carried from the parse into the prober
pub type PlayerCounts = HashMap<i64, u32>;

/// World tier as listed in the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldTier {
    Free,
    Members,
}

impl WorldTier {
    /// Map the directory's type column; anything other than "Members" is free
    pub fn from_label(label: &str) -> Self {
        if label.trim() == "Members" {
            Self::Members
        } else {
            Self::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Members => "Members",
        }
    }

    pub fn is_members(&self) -> bool {
        matches!(self, Self::Members)
    }
}

impl std::fmt::Display for WorldTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One world as parsed from the directory page
///
/// Ephemeral: produced by the parser and consumed once by a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub numeric_id: i64,
    pub name: String,
    pub player_count_text: String, // raw, e.g. "50 players" or "FULL"
    pub location: String,
    pub tier: WorldTier,
    pub activity: String,
    pub url: String, // derived from name
}

impl EndpointRecord {
    /// Build a record, deriving the URL from the name
    pub fn new(
        numeric_id: i64,
        name: impl Into<String>,
        player_count_text: impl Into<String>,
        location: impl Into<String>,
        tier: WorldTier,
        activity: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let url = world_url(&name);
        Self {
            numeric_id,
            name,
            player_count_text: player_count_text.into(),
            location: location.into(),
            tier,
            activity: activity.into(),
            url,
        }
    }

    /// Player count parsed from the raw text, `0` when it holds no number
    pub fn player_count(&self) -> u32 {
        extract_first_number(&self.player_count_text)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Check the fields the catalog requires
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MalformedRecord` naming the first offending field
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.numeric_id <= 0 {
            return Err(ParseError::MalformedRecord(format!(
                "non-positive world id {}",
                self.numeric_id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ParseError::MalformedRecord(format!(
                "world {} has no name",
                self.numeric_id
            )));
        }
        if Url::parse(&self.url).is_err() {
            return Err(ParseError::MalformedRecord(format!(
                "world {} has invalid url '{}'",
                self.numeric_id, self.url
            )));
        }
        Ok(())
    }
}

/// Build the id → player count lookup for a parsed directory
pub fn player_counts(records: &[EndpointRecord]) -> PlayerCounts {
    records
        .iter()
        .map(|r| (r.numeric_id, r.player_count()))
        .collect()
}

/// Persistent catalog row for a known world
///
/// Inserted once per world id and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub numeric_id: i64,
    pub name: String,
    pub url: String,
    pub location: String,
    pub is_members: bool,
    pub activity: String,
}

impl CatalogEntry {
    /// Map a parsed record onto the catalog schema
    ///
    /// Only the allowlisted fields are carried over; the raw player count
    /// text is not part of the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MalformedRecord` if the record fails validation
    pub fn from_record(record: &EndpointRecord) -> Result<Self, ParseError> {
        record.validate()?;
        Ok(Self {
            numeric_id: record.numeric_id,
            name: record.name.clone(),
            url: record.url.clone(),
            location: record.location.clone(),
            is_members: record.tier.is_members(),
            activity: record.activity.clone(),
        })
    }
}

impl TryFrom<&EndpointRecord> for CatalogEntry {
    type Error = ParseError;

    fn try_from(record: &EndpointRecord) -> Result<Self, Self::Error> {
        Self::from_record(record)
    }
}

/// One latency/occupancy sample for a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub endpoint_id: i64,
    pub timestamp: DateTime<Utc>,
    pub latency_seconds: f64,
    pub player_count: u32,
}

impl Measurement {
    /// Sample for a probe that got a response after `latency`
    pub fn succeeded(endpoint_id: i64, latency: Duration, player_count: u32) -> Self {
        Self {
            endpoint_id,
            timestamp: Utc::now(),
            latency_seconds: latency.as_secs_f64(),
            player_count,
        }
    }

    /// Sample for a probe that failed; carries the sentinel latency
    pub fn failed(endpoint_id: i64, player_count: u32) -> Self {
        Self {
            endpoint_id,
            timestamp: Utc::now(),
            latency_seconds: SENTINEL_LATENCY,
            player_count,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.latency_seconds >= SENTINEL_LATENCY
    }
}

/// Predicate selecting which catalog entries get probed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFilter {
    /// Only members worlds
    pub members_only: bool,

    /// Accepted locations; empty accepts every location
    pub locations: Vec<String>,

    /// Required activity text; `None` accepts any activity
    pub activity: Option<String>,
}

impl SelectionFilter {
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        if self.members_only && !entry.is_members {
            return false;
        }
        if !self.locations.is_empty() && !self.locations.iter().any(|l| *l == entry.location) {
            return false;
        }
        match &self.activity {
            Some(activity) => *activity == entry.activity,
            None => true,
        }
    }
}

impl Default for SelectionFilter {
    fn default() -> Self {
        Self {
            members_only: true,
            locations: vec!["Germany".to_string(), "United Kingdom".to_string()],
            activity: Some(IDLE_ACTIVITY.to_string()),
        }
    }
}

/// Outcome of one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records delivered by the directory parser
    pub fetched: usize,

    /// Catalog entries created by this batch
    pub new_entries: usize,

    /// Probes dispatched (equals measurements written)
    pub probes_attempted: usize,

    /// Probes that ended with the sentinel latency
    pub probes_failed: usize,
}

impl BatchSummary {
    /// Fraction of probes that got a response (1.0 when nothing was probed)
    pub fn reachability(&self) -> f64 {
        if self.probes_attempted == 0 {
            return 1.0;
        }
        (self.probes_attempted - self.probes_failed) as f64 / self.probes_attempted as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_record_derives_url() {
        assert_eq!(record_301().url, "http://world301.runescape.com/");
    }

    #[test]
    fn test_player_count_parsing() {
        let mut record = record_301();
        assert_eq!(record.player_count(), 50);

        record.player_count_text = "FULL".to_string();
        assert_eq!(record.player_count(), 0);
    }

    #[test]
    fn test_tier_from_label() {
        assert_eq!(WorldTier::from_label("Members"), WorldTier::Members);
        assert_eq!(WorldTier::from_label(" Members "), WorldTier::Members);
        assert_eq!(WorldTier::from_label("Free"), WorldTier::Free);
        assert_eq!(WorldTier::from_label(""), WorldTier::Free);
    }

    #[test]
    fn test_catalog_entry_mapping() {
        let entry = CatalogEntry::from_record(&record_301()).unwrap();
        assert_eq!(entry.numeric_id, 301);
        assert_eq!(entry.name, "World 301");
        assert_eq!(entry.url, "http://world301.runescape.com/");
        assert_eq!(entry.location, "United Kingdom");
        assert!(entry.is_members);
        assert_eq!(entry.activity, "-");
    }

    #[test]
    fn test_malformed_records_rejected() {
        let mut record = record_301();
        record.name = "   ".to_string();
        assert!(matches!(
            CatalogEntry::try_from(&record),
            Err(ParseError::MalformedRecord(_))
        ));

        let mut record = record_301();
        record.numeric_id = 0;
        assert!(record.validate().is_err());

        let mut record = record_301();
        record.url = "not a url".to_string();
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_measurement_constructors() {
        let ok = Measurement::succeeded(301, Duration::from_millis(420), 50);
        assert!((ok.latency_seconds - 0.42).abs() < 1e-9);
        assert!(!ok.is_failure());

        let failed = Measurement::failed(301, 50);
        assert_eq!(failed.latency_seconds, SENTINEL_LATENCY);
        assert!(failed.is_failure());
    }

    #[test]
    fn test_default_filter() {
        let filter = SelectionFilter::default();
        let entry = CatalogEntry::from_record(&record_301()).unwrap();
        assert!(filter.matches(&entry));

        let mut free = entry.clone();
        free.is_members = false;
        assert!(!filter.matches(&free));

        let mut elsewhere = entry.clone();
        elsewhere.location = "United States".to_string();
        assert!(!filter.matches(&elsewhere));

        let mut busy = entry;
        busy.activity = "Trade".to_string();
        assert!(!filter.matches(&busy));
    }

    #[test]
    fn test_open_filter_accepts_everything() {
        let filter = SelectionFilter {
            members_only: false,
            locations: Vec::new(),
            activity: None,
        };
        let mut entry = CatalogEntry::from_record(&record_301()).unwrap();
        entry.is_members = false;
        entry.activity = "PvP".to_string();
        assert!(filter.matches(&entry));
    }

    #[test]
    fn test_player_counts_lookup() {
        let counts = player_counts(&[record_301()]);
        assert_eq!(counts.get(&301), Some(&50));
        assert_eq!(counts.get(&302), None);
    }

    #[test]
    fn test_summary_reachability() {
        let summary = BatchSummary {
            fetched: 10,
            new_entries: 2,
            probes_attempted: 4,
            probes_failed: 1,
        };
        assert!((summary.reachability() - 0.75).abs() < 1e-9);
        assert_eq!(BatchSummary::default().reachability(), 1.0);
    }
}
