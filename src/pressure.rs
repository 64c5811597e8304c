use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::coerce::{as_i64_any, as_u64_any, get_u64, parse_float};
use crate::model::PressureRow;

/// Flattens `fixtures/{id}?include=pressure` into per-minute readings.
/// Entries without a team, a minute or a numeric pressure value are skipped.
pub fn normalize_pressure(doc: &Value, recorded_at: &str) -> Vec<PressureRow> {
    let Some(fixture) = doc.get("data").filter(|d| d.is_object()) else {
        warn!("pressure document has no data object");
        return Vec::new();
    };
    let Some(fixture_id) = get_u64(fixture, "id") else {
        warn!("pressure document has no fixture id");
        return Vec::new();
    };
    let Some(entries) = fixture.get("pressure").and_then(|p| p.as_array()) else {
        debug!(fixture_id, "fixture has no pressure array");
        return Vec::new();
    };

    let mut out = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for entry in entries {
        let team_id = entry.get("participant_id").and_then(as_u64_any);
        let minute = entry.get("minute").and_then(as_i64_any);
        let value = entry
            .get("pressure")
            .or_else(|| entry.get("value"))
            .map(parse_float);
        match (team_id, minute, value) {
            (Some(team_id), Some(minute), Some(Ok(pressure_index))) if minute >= 0 => {
                out.push(PressureRow {
                    fixture_id,
                    team_id,
                    minute,
                    pressure_index,
                    recorded_at: recorded_at.to_string(),
                });
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(fixture_id, skipped, "pressure entries skipped");
    }
    out
}

pub fn normalize_pressure_now(doc: &Value) -> Vec<PressureRow> {
    normalize_pressure(doc, &Utc::now().to_rfc3339())
}
