use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params};
use strum_macros::IntoStaticStr;
use tracing::info;

use crate::completeness::{DEFAULT_REQUIRED, find_incomplete_fixtures};
use crate::model::{FixtureStatus, Period, StatColumn};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub market_id: u64,
    pub bookmaker_id: u64,
    /// Asian-handicap line applied to the favorite's second half, e.g. `-0.5`.
    pub handicap_line: f64,
    pub feature_stats: Vec<StatColumn>,
    pub required_stats: Vec<StatColumn>,
    /// Adds the first-half average pressure index column; fixtures without
    /// pressure data are then excluded.
    pub pressure_feature: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            market_id: 1,
            bookmaker_id: 20,
            handicap_line: -0.5,
            feature_stats: DEFAULT_REQUIRED.to_vec(),
            required_stats: DEFAULT_REQUIRED.to_vec(),
            pressure_feature: false,
        }
    }
}

impl FeatureConfig {
    /// The favorite covers when its second-half margin exceeds this.
    pub fn threshold(&self) -> f64 {
        -self.handicap_line
    }

    /// Differential columns in output order: configured stats, then goals.
    pub fn diff_columns(&self) -> Vec<StatColumn> {
        let mut out = Vec::with_capacity(self.feature_stats.len() + 1);
        for column in &self.feature_stats {
            if *column != StatColumn::Goals && !out.contains(column) {
                out.push(*column);
            }
        }
        out.push(StatColumn::Goals);
        out
    }

    pub fn target_column(&self) -> String {
        let line = format!("{}", self.handicap_line)
            .replace('.', "_")
            .replace('-', "neg");
        format!("target_fav_covers_ah_{line}_2h")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
        }
    }
}

/// Joined inputs for one finished fixture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub fixture_id: u64,
    pub home_team_id: u64,
    pub away_team_id: u64,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub home_stats: BTreeMap<StatColumn, f64>,
    pub away_stats: BTreeMap<StatColumn, f64>,
    pub odds_home: Option<f64>,
    pub odds_draw: Option<f64>,
    pub odds_away: Option<f64>,
    /// Mean pressure index over minutes up to 45, both sides together.
    pub avg_pressure_1h: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Exclusion {
    MissingPrice,
    InvalidPrice,
    NoFavorite,
    MissingScore,
    MissingHalfTimeGoals,
    InconsistentScore,
    MissingPressure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub fixture_id: u64,
    pub favorite: Side,
    pub ht_diffs: Vec<(StatColumn, Option<f64>)>,
    pub odds_home: f64,
    pub odds_draw: f64,
    pub odds_away: f64,
    pub implied_prob_home: f64,
    pub implied_prob_draw: f64,
    pub implied_prob_away: f64,
    pub prob_margin: f64,
    pub odds_ratio_hw: f64,
    pub odds_fav: f64,
    pub odds_und: f64,
    pub avg_pressure_index_1st_half: Option<f64>,
    pub target: u8,
}

impl FeatureRow {
    pub fn ht_diff(&self, column: StatColumn) -> Option<f64> {
        self.ht_diffs
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, v)| *v)
    }
}

fn valid_price(p: f64) -> bool {
    p.is_finite() && p > 0.0
}

pub fn derive_feature_row(c: &Candidate, cfg: &FeatureConfig) -> Result<FeatureRow, Exclusion> {
    let (Some(odds_home), Some(odds_draw), Some(odds_away)) = (c.odds_home, c.odds_draw, c.odds_away)
    else {
        return Err(Exclusion::MissingPrice);
    };
    if ![odds_home, odds_draw, odds_away].into_iter().all(valid_price) {
        return Err(Exclusion::InvalidPrice);
    }
    let favorite = if odds_home < odds_away {
        Side::Home
    } else if odds_away < odds_home {
        Side::Away
    } else {
        return Err(Exclusion::NoFavorite);
    };

    let (Some(home_score), Some(away_score)) = (c.home_score, c.away_score) else {
        return Err(Exclusion::MissingScore);
    };
    let (Some(ht_home), Some(ht_away)) = (
        c.home_stats.get(&StatColumn::Goals).copied(),
        c.away_stats.get(&StatColumn::Goals).copied(),
    ) else {
        return Err(Exclusion::MissingHalfTimeGoals);
    };
    let sh_home = home_score as f64 - ht_home;
    let sh_away = away_score as f64 - ht_away;
    if sh_home < 0.0 || sh_away < 0.0 {
        return Err(Exclusion::InconsistentScore);
    }
    let avg_pressure_index_1st_half = match (cfg.pressure_feature, c.avg_pressure_1h) {
        (false, _) => None,
        (true, Some(p)) if p.is_finite() => Some(p),
        (true, _) => return Err(Exclusion::MissingPressure),
    };

    let (fav_stats, und_stats, odds_fav, odds_und, fav_2h, und_2h) = match favorite {
        Side::Home => (&c.home_stats, &c.away_stats, odds_home, odds_away, sh_home, sh_away),
        Side::Away => (&c.away_stats, &c.home_stats, odds_away, odds_home, sh_away, sh_home),
    };

    let ht_diffs = cfg
        .diff_columns()
        .into_iter()
        .map(|column| {
            let diff = match (fav_stats.get(&column), und_stats.get(&column)) {
                (Some(f), Some(u)) => Some(f - u),
                _ => None,
            };
            (column, diff)
        })
        .collect();

    let implied_prob_home = 1.0 / odds_home;
    let implied_prob_away = 1.0 / odds_away;
    let implied_prob_draw = 1.0 / odds_draw;
    let prob_margin = implied_prob_home + implied_prob_draw + implied_prob_away - 1.0;

    Ok(FeatureRow {
        fixture_id: c.fixture_id,
        favorite,
        ht_diffs,
        odds_home,
        odds_draw,
        odds_away,
        implied_prob_home,
        implied_prob_draw,
        implied_prob_away,
        prob_margin,
        odds_ratio_hw: odds_home / odds_away,
        odds_fav,
        odds_und,
        avg_pressure_index_1st_half,
        target: u8::from(fav_2h - und_2h > cfg.threshold()),
    })
}

fn odds_subquery(labels: &str) -> String {
    format!(
        "(SELECT o.price FROM fixture_odds o
          WHERE o.fixture_id = f.fixture_id AND o.market_id = ?1 AND o.bookmaker_id = ?2
            AND LOWER(o.label) IN ({labels}) AND o.handicap = '' AND o.total = ''
          ORDER BY o.id LIMIT 1)"
    )
}

fn sql_f64(v: SqlValue) -> Option<f64> {
    match v {
        SqlValue::Integer(n) => Some(n as f64),
        SqlValue::Real(f) => Some(f),
        _ => None,
    }
}

/// Finished fixtures with first-half rows for both sides, plus their
/// win-market prices for the configured market and bookmaker.
pub fn load_candidates(conn: &Connection, cfg: &FeatureConfig) -> Result<Vec<Candidate>> {
    let columns = cfg.diff_columns();
    let mut select = vec![
        "f.fixture_id".to_string(),
        "f.home_team_id".to_string(),
        "f.away_team_id".to_string(),
        "f.home_score".to_string(),
        "f.away_score".to_string(),
        format!("{} AS odds_home", odds_subquery("'home', '1'")),
        format!("{} AS odds_draw", odds_subquery("'draw', 'x'")),
        format!("{} AS odds_away", odds_subquery("'away', '2'")),
        "(SELECT AVG(t.pressure_index) FROM fixture_timeline t
          WHERE t.fixture_id = f.fixture_id AND t.event_type = 'pressure' AND t.minute <= 45)
          AS avg_pressure_1h"
            .to_string(),
    ];
    for column in &columns {
        select.push(format!("hs.{0} AS ht_home_{0}", column.name()));
    }
    for column in &columns {
        select.push(format!("aws.{0} AS ht_away_{0}", column.name()));
    }
    let finished = FixtureStatus::FINISHED
        .iter()
        .map(|s| format!("'{}'", s.code()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        r#"
        SELECT {}
        FROM fixtures f
        INNER JOIN fixture_stats hs
            ON hs.fixture_id = f.fixture_id AND hs.team_id = f.home_team_id AND hs.period = ?3
        INNER JOIN fixture_stats aws
            ON aws.fixture_id = f.fixture_id AND aws.team_id = f.away_team_id AND aws.period = ?3
        WHERE f.status IN ({finished})
        ORDER BY f.fixture_id
        "#,
        select.join(",\n            ")
    );

    let mut stmt = conn.prepare(&sql).context("prepare candidate query")?;
    let base = 9;
    let rows = stmt
        .query_map(
            params![
                cfg.market_id as i64,
                cfg.bookmaker_id as i64,
                Period::FirstHalf.label()
            ],
            |row| {
                let mut c = Candidate {
                    fixture_id: row.get::<_, i64>(0)? as u64,
                    home_team_id: row.get::<_, i64>(1)? as u64,
                    away_team_id: row.get::<_, i64>(2)? as u64,
                    home_score: row.get(3)?,
                    away_score: row.get(4)?,
                    odds_home: sql_f64(row.get(5)?),
                    odds_draw: sql_f64(row.get(6)?),
                    odds_away: sql_f64(row.get(7)?),
                    avg_pressure_1h: sql_f64(row.get(8)?),
                    ..Candidate::default()
                };
                for (idx, column) in columns.iter().enumerate() {
                    if let Some(v) = sql_f64(row.get(base + idx)?) {
                        c.home_stats.insert(*column, v);
                    }
                    if let Some(v) = sql_f64(row.get(base + columns.len() + idx)?) {
                        c.away_stats.insert(*column, v);
                    }
                }
                Ok(c)
            },
        )
        .context("query candidates")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode candidate row")?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetReport {
    pub candidates: usize,
    pub excluded_incomplete: usize,
    pub rows: usize,
    pub exclusions: BTreeMap<&'static str, usize>,
}

pub fn build_dataset(
    conn: &Connection,
    cfg: &FeatureConfig,
) -> Result<(Vec<FeatureRow>, DatasetReport)> {
    let incomplete = find_incomplete_fixtures(conn, &cfg.required_stats)?
        .into_iter()
        .collect::<HashSet<_>>();
    let candidates = load_candidates(conn, cfg)?;

    let mut report = DatasetReport {
        candidates: candidates.len(),
        ..DatasetReport::default()
    };
    let mut rows = Vec::new();
    for candidate in &candidates {
        if incomplete.contains(&candidate.fixture_id) {
            report.excluded_incomplete += 1;
            continue;
        }
        match derive_feature_row(candidate, cfg) {
            Ok(row) => rows.push(row),
            Err(reason) => *report.exclusions.entry(reason.into()).or_default() += 1,
        }
    }
    report.rows = rows.len();

    let covers = rows.iter().filter(|r| r.target == 1).count();
    info!(
        candidates = report.candidates,
        rows = report.rows,
        covers,
        target = %cfg.target_column(),
        "dataset built"
    );
    Ok((rows, report))
}
