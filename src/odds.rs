use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::coerce::{as_string_any, bool_or, get_string, get_u64, parse_float, parse_percent};
use crate::model::OddsRow;

/// Market and bookmaker allow-sets. Quotes outside either set are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddsFilter {
    pub markets: BTreeSet<u64>,
    pub bookmakers: BTreeSet<u64>,
}

impl OddsFilter {
    pub fn new(
        markets: impl IntoIterator<Item = u64>,
        bookmakers: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            markets: markets.into_iter().collect(),
            bookmakers: bookmakers.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OddsCounts {
    pub seen: usize,
    pub kept: usize,
    pub missing_fields: usize,
    pub filtered_market: usize,
    pub filtered_bookmaker: usize,
    pub malformed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OddsBatch {
    pub rows: Vec<OddsRow>,
    pub counts: OddsCounts,
}

/// Accepts `{"data": [...]}` or a bare array of quotes.
pub fn normalize_prematch_odds(doc: &Value, filter: &OddsFilter) -> OddsBatch {
    let entries = doc
        .get("data")
        .and_then(|d| d.as_array())
        .or_else(|| doc.as_array());
    let mut batch = OddsBatch::default();
    let Some(entries) = entries else {
        debug!("odds document has no quote array");
        return batch;
    };

    for entry in entries {
        batch.counts.seen += 1;
        if !entry.is_object() {
            batch.counts.malformed += 1;
            continue;
        }
        match normalize_quote(entry, filter) {
            Ok(row) => {
                batch.counts.kept += 1;
                batch.rows.push(row);
            }
            Err(Rejection::MissingFields) => batch.counts.missing_fields += 1,
            Err(Rejection::Market) => batch.counts.filtered_market += 1,
            Err(Rejection::Bookmaker) => batch.counts.filtered_bookmaker += 1,
        }
    }
    batch
}

enum Rejection {
    MissingFields,
    Market,
    Bookmaker,
}

fn normalize_quote(entry: &Value, filter: &OddsFilter) -> Result<OddsRow, Rejection> {
    let (Some(fixture_id), Some(market_id), Some(bookmaker_id), Some(label)) = (
        get_u64(entry, "fixture_id"),
        get_u64(entry, "market_id"),
        get_u64(entry, "bookmaker_id"),
        get_string(entry, "label"),
    ) else {
        return Err(Rejection::MissingFields);
    };
    if !filter.markets.contains(&market_id) {
        return Err(Rejection::Market);
    }
    if !filter.bookmakers.contains(&bookmaker_id) {
        return Err(Rejection::Bookmaker);
    }

    let price = entry
        .get("value")
        .and_then(|v| parse_float(v).ok())
        .or_else(|| entry.get("dp3").and_then(|v| parse_float(v).ok()));
    let probability = entry.get("probability").and_then(|v| parse_percent(v).ok());

    Ok(OddsRow {
        odds_id: get_u64(entry, "id"),
        fixture_id,
        market_id,
        bookmaker_id,
        label,
        handicap: line_key(entry.get("handicap")),
        total: line_key(entry.get("total")),
        name: get_string(entry, "name"),
        market_description: get_string(entry, "market_description"),
        price,
        probability,
        fractional: get_string(entry, "fractional"),
        american: get_string(entry, "american"),
        winning: bool_or(entry.get("winning"), false),
        stopped: bool_or(entry.get("stopped"), false),
        bookmaker_updated_at: get_string(entry, "latest_bookmaker_update"),
    })
}

/// Handicap and total lines are part of the natural key, so an absent line
/// is stored as the empty string.
fn line_key(v: Option<&Value>) -> String {
    v.and_then(as_string_any).unwrap_or_default()
}
