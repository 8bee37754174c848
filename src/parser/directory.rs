//! World directory page parser
//!
//! Turns the server list HTML into [`EndpointRecord`]s. Rows that do not carry
//! all five cells or a world link are logged and skipped; they never fail the
//! whole page.

use scraper::{ElementRef, Html};

use crate::models::{EndpointRecord, WorldTier};
use crate::parser::selectors::{DirectoryColumn, DirectorySelectors};
use crate::utils::error::ParseError;
use crate::utils::{extract_first_number, normalize_whitespace};

/// Server list parser
pub struct DirectoryParser {
    selectors: DirectorySelectors,
}

impl DirectoryParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            selectors: DirectorySelectors::new(),
        }
    }

    /// Parse every well-formed world row on the page
    ///
    /// # Errors
    ///
    /// Returns `ParseError::TableNotFound` if the page has no server list
    pub fn parse(&self, html: &str) -> Result<Vec<EndpointRecord>, ParseError> {
        let document = Html::parse_document(html);

        let table = self
            .selectors
            .table
            .iter()
            .find_map(|sel| document.select(sel).next())
            .ok_or(ParseError::TableNotFound)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (index, row) in table.select(self.selectors.row).enumerate() {
            // Header rows carry <th> only
            if row.select(self.selectors.cell).next().is_none() {
                continue;
            }

            match self.parse_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(row = index, error = %e, "Skipping malformed directory row");
                }
            }
        }

        tracing::debug!(parsed = records.len(), skipped, "Parsed world directory");
        Ok(records)
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Result<EndpointRecord, ParseError> {
        let cells: Vec<String> = row
            .select(self.selectors.cell)
            .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
            .collect();

        if cells.len() < DirectoryColumn::COUNT {
            return Err(ParseError::MalformedRecord(format!(
                "expected {} cells, found {}",
                DirectoryColumn::COUNT,
                cells.len()
            )));
        }

        let link_id = self
            .selectors
            .world_link
            .iter()
            .find_map(|sel| row.select(sel).next())
            .and_then(|link| link.value().attr("id"))
            .ok_or_else(|| ParseError::MalformedRecord("row has no world link id".to_string()))?;

        let numeric_id = extract_first_number(link_id)
            .ok_or_else(|| ParseError::IdExtractionFailed(link_id.to_string()))?;

        let cell = |column: DirectoryColumn| cells[column.index()].clone();

        Ok(EndpointRecord::new(
            numeric_id,
            cell(DirectoryColumn::World),
            cell(DirectoryColumn::Players),
            cell(DirectoryColumn::Location),
            WorldTier::from_label(&cells[DirectoryColumn::Type.index()]),
            cell(DirectoryColumn::Activity),
        ))
    }
}

impl Default for DirectoryParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body>
        <table class="server-list">
          <thead>
            <tr><th>World</th><th>Players</th><th>Location</th><th>Type</th><th>Activity</th></tr>
          </thead>
          <tbody>
            <tr class="server-list__row">
              <td><a id="slu-world-301" class="server-list__world-link" href="#">World 301</a></td>
              <td>50 players</td>
              <td>United Kingdom</td>
              <td>Members</td>
              <td>-</td>
            </tr>
            <tr class="server-list__row">
              <td><a id="slu-world-308" class="server-list__world-link" href="#">World 308</a></td>
              <td>FULL</td>
              <td>Germany</td>
              <td>Free</td>
              <td>Trade</td>
            </tr>
            <tr class="server-list__row">
              <td>World 999</td>
              <td>10 players</td>
              <td>Germany</td>
              <td>Members</td>
              <td>-</td>
            </tr>
            <tr class="server-list__row">
              <td><a id="slu-world-400" class="server-list__world-link" href="#">World 400</a></td>
              <td>10 players</td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "##;

    #[test]
    fn test_parse_well_formed_rows() {
        let records = DirectoryParser::new().parse(PAGE).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.numeric_id, 301);
        assert_eq!(first.name, "World 301");
        assert_eq!(first.player_count(), 50);
        assert_eq!(first.location, "United Kingdom");
        assert_eq!(first.tier, WorldTier::Members);
        assert_eq!(first.activity, "-");
        assert_eq!(first.url, "http://world301.runescape.com/");

        let second = &records[1];
        assert_eq!(second.numeric_id, 308);
        assert_eq!(second.player_count(), 0);
        assert_eq!(second.tier, WorldTier::Free);
    }

    #[test]
    fn test_missing_table() {
        let result = DirectoryParser::new().parse("<html><body><p>maintenance</p></body></html>");
        assert_eq!(result, Err(ParseError::TableNotFound));
    }

    #[test]
    fn test_table_without_rows() {
        let html = r#"<table class="server-list"><tbody></tbody></table>"#;
        let records = DirectoryParser::new().parse(html).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_whitespace_normalised() {
        let html = r#"<table class="server-list"><tbody><tr>
            <td><a id="slu-world-5" class="server-list__world-link">
                 World   5 </a></td>
            <td> 7
                 players </td>
            <td>United
                Kingdom</td>
            <td>Members</td>
            <td>-</td>
        </tr></tbody></table>"#;
        let records = DirectoryParser::new().parse(html).unwrap();
        assert_eq!(records[0].name, "World 5");
        assert_eq!(records[0].location, "United Kingdom");
        assert_eq!(records[0].player_count(), 7);
    }
}
