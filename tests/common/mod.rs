//! Common test utilities

use worldping::models::{EndpointRecord, WorldTier};

/// One directory row as served by the world list page
pub struct Row<'a> {
    pub id: i64,
    pub players: &'a str,
    pub location: &'a str,
    pub tier: &'a str,
    pub activity: &'a str,
}

/// Render a world directory page with the given rows
#[allow(dead_code)]
pub fn directory_page(rows: &[Row<'_>]) -> String {
    let body: String = rows
        .iter()
        .map(|row| {
            format!(
                r#"<tr class="server-list__row">
                  <td><a id="slu-world-{id}" class="server-list__world-link" href="http://world{id}.runescape.com/">World {id}</a></td>
                  <td>{players}</td>
                  <td>{location}</td>
                  <td>{tier}</td>
                  <td>{activity}</td>
                </tr>"#,
                id = row.id,
                players = row.players,
                location = row.location,
                tier = row.tier,
                activity = row.activity,
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head><title>Server List</title></head>
<body>
<table class="server-list">
  <thead><tr><th>World</th><th>Players</th><th>Location</th><th>Type</th><th>Activity</th></tr></thead>
  <tbody>{body}</tbody>
</table>
</body></html>"#
    )
}

/// A members world in the United Kingdom with no activity
#[allow(dead_code)]
pub fn members_record(id: i64, players: &str) -> EndpointRecord {
    EndpointRecord::new(
        id,
        format!("World {id}"),
        players,
        "United Kingdom",
        WorldTier::Members,
        "-",
    )
}

/// Probe URL derived for `World {id}`
#[allow(dead_code)]
pub fn world_url(id: i64) -> String {
    format!("http://world{id}.runescape.com/")
}
