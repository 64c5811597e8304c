use serde_json::Value;
use tracing::{debug, warn};

use crate::coerce::{as_i64_any, as_u64_any, bool_or, get_string, get_u64};
use crate::model::{Fixture, FixtureStatus, League, Season, Team};

/// Ordered list of score descriptions consulted for the final score. The
/// first description that yields both sides wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorePolicy {
    pub preference: Vec<String>,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            preference: vec!["CURRENT".to_string(), "2ND_HALF".to_string()],
        }
    }
}

impl ScorePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        let preference = raw
            .split([',', ';', ' '])
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        (!preference.is_empty()).then_some(Self { preference })
    }

    pub fn resolve(
        &self,
        scores: &[Value],
        home_team_id: Option<u64>,
        away_team_id: Option<u64>,
    ) -> Option<(i64, i64)> {
        for wanted in &self.preference {
            let mut home = None;
            let mut away = None;
            for score in scores {
                let matches = score
                    .get("description")
                    .and_then(|d| d.as_str())
                    .is_some_and(|d| d.eq_ignore_ascii_case(wanted));
                if !matches {
                    continue;
                }
                let Some(inner) = score.get("score") else {
                    continue;
                };
                let Some(goals) = inner.get("goals").and_then(as_i64_any) else {
                    continue;
                };
                let side = inner
                    .get("participant")
                    .and_then(|p| p.as_str())
                    .map(|p| p.to_ascii_lowercase());
                let participant_id = score.get("participant_id").and_then(as_u64_any);
                let is_home = side.as_deref() == Some("home")
                    || (participant_id.is_some() && participant_id == home_team_id);
                let is_away = side.as_deref() == Some("away")
                    || (participant_id.is_some() && participant_id == away_team_id);
                if is_home {
                    home = Some(goals);
                } else if is_away {
                    away = Some(goals);
                }
            }
            if let (Some(h), Some(a)) = (home, away) {
                return Some((h, a));
            }
        }
        None
    }
}

/// Walks a `schedules/seasons/{id}` document: stages, their rounds, and the
/// fixtures inside each round. Stage-level fixture lists (cup formats without
/// rounds) are picked up too.
pub fn normalize_schedule(doc: &Value, policy: &ScorePolicy) -> Vec<Fixture> {
    let Some(stages) = doc.get("data").and_then(|d| d.as_array()) else {
        warn!("schedule document has no data array");
        return Vec::new();
    };

    let mut out = Vec::new();
    for stage in stages {
        if !stage.is_object() {
            continue;
        }
        let stage_id = get_u64(stage, "id");
        let stage_season = get_u64(stage, "season_id");

        if let Some(rounds) = stage.get("rounds").and_then(|r| r.as_array()) {
            for round in rounds {
                let round_id = get_u64(round, "id");
                let season_id = get_u64(round, "season_id").or(stage_season);
                let round_finished = round.get("finished").map(|v| bool_or(Some(v), false));
                let Some(fixtures) = round.get("fixtures").and_then(|f| f.as_array()) else {
                    debug!(?round_id, "round has no fixtures");
                    continue;
                };
                for fx in fixtures {
                    let context = RoundContext {
                        stage_id,
                        round_id,
                        season_id,
                        round_finished,
                    };
                    if let Some(row) = normalize_fixture(fx, &context, policy) {
                        out.push(row);
                    }
                }
            }
        }

        if let Some(fixtures) = stage.get("fixtures").and_then(|f| f.as_array()) {
            let context = RoundContext {
                stage_id,
                round_id: None,
                season_id: stage_season,
                round_finished: None,
            };
            for fx in fixtures {
                if let Some(row) = normalize_fixture(fx, &context, policy) {
                    out.push(row);
                }
            }
        }
    }
    out
}

struct RoundContext {
    stage_id: Option<u64>,
    round_id: Option<u64>,
    season_id: Option<u64>,
    round_finished: Option<bool>,
}

fn normalize_fixture(fx: &Value, context: &RoundContext, policy: &ScorePolicy) -> Option<Fixture> {
    let fixture_id = get_u64(fx, "id").filter(|id| *id != 0)?;
    let Some(season_id) = get_u64(fx, "season_id").or(context.season_id) else {
        debug!(fixture_id, "fixture without season id; skipping");
        return None;
    };

    let status = fx
        .get("state_id")
        .and_then(as_u64_any)
        .map(FixtureStatus::from_state_id)
        .filter(|s| *s != FixtureStatus::Unknown)
        .or_else(|| {
            let state = fx.get("state")?;
            get_string(state, "short_name")
                .or_else(|| get_string(state, "developer_name"))
                .map(|code| FixtureStatus::from_code(&code))
        })
        .unwrap_or(FixtureStatus::Unknown);

    let mut home_team_id = None;
    let mut away_team_id = None;
    if let Some(participants) = fx.get("participants").and_then(|p| p.as_array()) {
        for p in participants {
            let id = get_u64(p, "id");
            let location = p
                .get("meta")
                .and_then(|m| m.get("location"))
                .and_then(|l| l.as_str());
            match location {
                Some("home") => home_team_id = id,
                Some("away") => away_team_id = id,
                _ => {}
            }
        }
    }

    let (home_score, away_score) = if status.is_finished() {
        let scores = fx
            .get("scores")
            .and_then(|s| s.as_array())
            .map(|s| s.as_slice())
            .unwrap_or_default();
        match policy.resolve(scores, home_team_id, away_team_id) {
            Some((h, a)) => (Some(h), Some(a)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Some(Fixture {
        fixture_id,
        league_id: get_u64(fx, "league_id"),
        season_id,
        stage_id: get_u64(fx, "stage_id").or(context.stage_id),
        round_id: get_u64(fx, "round_id").or(context.round_id),
        round_finished: context.round_finished,
        starting_at: get_string(fx, "starting_at"),
        status,
        home_team_id,
        away_team_id,
        home_score,
        away_score,
    })
}

/// A league row plus any seasons nested under `include=seasons`.
pub fn normalize_league(v: &Value) -> Option<(League, Vec<Season>)> {
    let (Some(league_id), Some(name)) = (get_u64(v, "id"), get_string(v, "name")) else {
        warn!(id = ?v.get("id"), "skipping league without id or name");
        return None;
    };
    let current_season_id = v
        .get("currentseason")
        .or_else(|| v.get("currentSeason"))
        .and_then(|s| get_u64(s, "id"));
    let league = League {
        league_id,
        sport_id: get_u64(v, "sport_id"),
        country_id: get_u64(v, "country_id"),
        name,
        active: bool_or(v.get("active"), false),
        short_code: get_string(v, "short_code"),
        image_path: get_string(v, "image_path"),
        league_type: get_string(v, "type"),
        sub_type: get_string(v, "sub_type"),
        last_played_at: get_string(v, "last_played_at"),
        category: v.get("category").and_then(as_i64_any),
        current_season_id,
    };
    let seasons = v
        .get("seasons")
        .and_then(|s| s.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| normalize_season(s, Some(league_id)))
                .collect()
        })
        .unwrap_or_default();
    Some((league, seasons))
}

pub fn normalize_season(v: &Value, parent_league_id: Option<u64>) -> Option<Season> {
    let season_id = get_u64(v, "id");
    let league_id = get_u64(v, "league_id").or(parent_league_id);
    let name = get_string(v, "name");
    let (Some(season_id), Some(league_id), Some(name)) = (season_id, league_id, name) else {
        warn!(id = ?v.get("id"), "skipping season without id, league id or name");
        return None;
    };
    Some(Season {
        season_id,
        league_id,
        sport_id: get_u64(v, "sport_id"),
        name,
        is_current: bool_or(v.get("is_current"), false),
        finished: bool_or(v.get("finished"), false),
        pending: bool_or(v.get("pending"), false),
        starting_at: get_string(v, "starting_at"),
        ending_at: get_string(v, "ending_at"),
    })
}

pub fn normalize_team(v: &Value) -> Option<Team> {
    let (Some(team_id), Some(name)) = (get_u64(v, "id"), get_string(v, "name")) else {
        warn!(id = ?v.get("id"), "skipping team without id or name");
        return None;
    };
    Some(Team {
        team_id,
        name,
        short_code: get_string(v, "short_code"),
        country_id: get_u64(v, "country_id"),
        logo_url: get_string(v, "image_path"),
        venue_id: get_u64(v, "venue_id"),
        founded: v.get("founded").and_then(as_i64_any),
        team_type: get_string(v, "type"),
        national_team: bool_or(v.get("national_team"), false),
    })
}
