use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::coerce::{as_u64_any, get_string, get_u64, parse_stat};
use crate::model::{Period, StatColumn, StatRow};

/// Flattens one fixture document (`fixtures/{id}?include=periods.statistics.type`)
/// into one row per (team, period). Never fails: malformed pieces are skipped
/// and logged, so an unusable document yields an empty vec.
pub fn normalize_fixture_stats(doc: &Value, recorded_at: &str) -> Vec<StatRow> {
    let fixture = doc.get("data").filter(|d| d.is_object()).unwrap_or(doc);

    let Some(fixture_id) = get_u64(fixture, "id") else {
        warn!("fixture document has no id; skipping");
        return Vec::new();
    };
    let Some(periods) = fixture.get("periods").and_then(|p| p.as_array()) else {
        warn!(fixture_id, "fixture has no periods array");
        return Vec::new();
    };

    let mut out = Vec::new();
    for period in periods {
        let Some(label) = period_label(period) else {
            warn!(fixture_id, "period without id or description; skipping");
            continue;
        };
        let Some(stats) = period.get("statistics").and_then(|s| s.as_array()) else {
            debug!(fixture_id, period = %label, "period has no statistics");
            continue;
        };

        let mut by_team: BTreeMap<u64, BTreeMap<StatColumn, &Value>> = BTreeMap::new();
        for stat in stats {
            let Some(team_id) = stat.get("participant_id").and_then(as_u64_any) else {
                continue;
            };
            let Some(code) = stat
                .get("type")
                .and_then(|t| t.get("code"))
                .and_then(|c| c.as_str())
            else {
                continue;
            };
            let Some(value) = stat
                .get("data")
                .and_then(|d| d.get("value"))
                .filter(|v| !v.is_null())
            else {
                continue;
            };
            // a team with only unmapped codes still gets an all-null row
            let team = by_team.entry(team_id).or_default();
            match StatColumn::from_api_code(code) {
                Some(column) => {
                    team.insert(column, value);
                }
                None => debug!(fixture_id, code, "unmapped statistic code"),
            }
        }

        for (team_id, values) in by_team {
            let mut row = StatRow::new(fixture_id, team_id, label.clone(), recorded_at);
            for (column, raw) in values {
                match parse_stat(column, raw) {
                    Ok(v) => row.set(column, Some(v)),
                    Err(err) => {
                        warn!(
                            fixture_id,
                            team_id,
                            column = column.name(),
                            error = %err,
                            "statistic conversion failed"
                        );
                        row.set(column, None);
                    }
                }
            }
            out.push(row);
        }
    }
    out
}

pub fn normalize_fixture_stats_now(doc: &Value) -> Vec<StatRow> {
    normalize_fixture_stats(doc, &Utc::now().to_rfc3339())
}

fn period_label(period: &Value) -> Option<Period> {
    if let Some(description) = get_string(period, "description") {
        return Some(Period::from_description(&description));
    }
    let id = get_u64(period, "id")?;
    Some(Period::Other(format!("period-{id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_document_without_envelope_is_accepted() {
        let doc = json!({
            "id": 10,
            "periods": [{
                "id": 1,
                "description": "1st-half",
                "statistics": [
                    {"participant_id": 5, "type": {"code": "goals"}, "data": {"value": 1}}
                ]
            }]
        });
        let rows = normalize_fixture_stats(&doc, "t0");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fixture_id, 10);
        assert_eq!(rows[0].period, Period::FirstHalf);
    }

    #[test]
    fn period_without_description_uses_id() {
        let label = period_label(&json!({"id": 77}));
        assert_eq!(label, Some(Period::Other("period-77".to_string())));
        assert_eq!(period_label(&json!({})), None);
    }

    #[test]
    fn team_with_only_unmapped_codes_keeps_a_null_row() {
        let doc = json!({
            "data": {
                "id": 11,
                "periods": [{
                    "id": 1,
                    "description": "1st-half",
                    "statistics": [
                        {"participant_id": 10, "type": {"code": "goals"}, "data": {"value": 2}},
                        {"participant_id": 20, "type": {"code": "expected-goals"}, "data": {"value": 0.4}}
                    ]
                }]
            }
        });
        let rows = normalize_fixture_stats(&doc, "t");
        let teams = rows.iter().map(|r| r.team_id).collect::<Vec<_>>();
        assert_eq!(teams, vec![10, 20]);
        assert!(rows[1].values().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn missing_periods_yield_nothing() {
        assert!(normalize_fixture_stats(&json!({"data": {"id": 3}}), "t").is_empty());
        assert!(normalize_fixture_stats(&json!({"data": []}), "t").is_empty());
    }
}
