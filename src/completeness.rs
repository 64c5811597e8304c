use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::model::{Period, StatColumn};

/// First-half columns of which at least one must be present per team row.
pub const DEFAULT_REQUIRED: [StatColumn; 11] = [
    StatColumn::Goals,
    StatColumn::Fouls,
    StatColumn::RedCards,
    StatColumn::Tackles,
    StatColumn::ShotsBlocked,
    StatColumn::SuccessfulPassesPercentage,
    StatColumn::BallPossession,
    StatColumn::Saves,
    StatColumn::Attacks,
    StatColumn::ShotsTotal,
    StatColumn::ShotsInsidebox,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessReport {
    /// Fixtures with at least one first-half row.
    pub checked: usize,
    pub incomplete: Vec<u64>,
}

/// Fixture ids whose first-half data is unusable: fewer than two teams, or
/// some team row with every required column null. Sorted and distinct.
///
/// An empty `required` set makes the all-null condition hold for every row.
pub fn find_incomplete_fixtures(conn: &Connection, required: &[StatColumn]) -> Result<Vec<u64>> {
    let all_null = if required.is_empty() {
        "1 = 1".to_string()
    } else {
        required
            .iter()
            .map(|c| format!("{} IS NULL", c.name()))
            .collect::<Vec<_>>()
            .join(" AND ")
    };
    let sql = format!(
        r#"
        SELECT fixture_id FROM (
            SELECT DISTINCT fixture_id
            FROM fixture_stats
            WHERE period = ?1 AND ({all_null})
            UNION
            SELECT fixture_id
            FROM fixture_stats
            WHERE period = ?1
            GROUP BY fixture_id
            HAVING COUNT(DISTINCT team_id) < 2
        )
        ORDER BY fixture_id
        "#
    );

    let mut stmt = conn.prepare(&sql).context("prepare completeness query")?;
    let rows = stmt
        .query_map([Period::FirstHalf.label()], |row| row.get::<_, i64>(0))
        .context("query incomplete fixtures")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode fixture id")? as u64);
    }
    info!(incomplete = out.len(), "completeness scan finished");
    Ok(out)
}

pub fn completeness_report(conn: &Connection, required: &[StatColumn]) -> Result<CompletenessReport> {
    let checked = conn
        .query_row(
            "SELECT COUNT(DISTINCT fixture_id) FROM fixture_stats WHERE period = ?1",
            [Period::FirstHalf.label()],
            |row| row.get::<_, i64>(0),
        )
        .context("count first-half fixtures")?;
    let incomplete = find_incomplete_fixtures(conn, required)?;
    Ok(CompletenessReport {
        checked: checked as usize,
        incomplete,
    })
}
