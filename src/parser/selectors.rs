//! CSS selectors for the world directory page
//!
//! The directory lists one world per table row. Each row carries a link whose
//! `id` attribute embeds the stable world number (e.g. `slu-world-301`).

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    static ref SERVER_TABLE: Vec<Selector> = vec![
        parse_selector!("table.server-list"),
        parse_selector!("table[class*='server-list']"),
    ];

    static ref SERVER_ROW: Selector = parse_selector!("tbody tr");
    static ref ROW_CELL: Selector = parse_selector!("td");

    static ref WORLD_LINK: Vec<Selector> = vec![
        parse_selector!("a.server-list__world-link"),
        parse_selector!("a[id^='slu-world-']"),
    ];
}

/// Column order of the server list table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryColumn {
    World = 0,
    Players = 1,
    Location = 2,
    Type = 3,
    Activity = 4,
}

impl DirectoryColumn {
    /// Number of cells a well-formed row carries
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Selectors for the server list page
pub struct DirectorySelectors {
    pub table: &'static [Selector],
    pub row: &'static Selector,
    pub cell: &'static Selector,
    pub world_link: &'static [Selector],
}

impl DirectorySelectors {
    pub fn new() -> Self {
        Self {
            table: &SERVER_TABLE,
            row: &SERVER_ROW,
            cell: &ROW_CELL,
            world_link: &WORLD_LINK,
        }
    }
}

impl Default for DirectorySelectors {
    fn default() -> Self {
        Self::new()
    }
}
