use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{EnumCount, EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureStatus {
    NotStarted,
    Live,
    HalfTime,
    Finished,
    FinishedAfterExtraTime,
    FinishedAfterPenalties,
    Postponed,
    Cancelled,
    Abandoned,
    Awarded,
    Interrupted,
    Unknown,
}

impl FixtureStatus {
    pub const FINISHED: [FixtureStatus; 3] = [
        FixtureStatus::Finished,
        FixtureStatus::FinishedAfterExtraTime,
        FixtureStatus::FinishedAfterPenalties,
    ];

    /// Maps the provider's numeric `state_id`.
    pub fn from_state_id(id: u64) -> Self {
        match id {
            1 | 13 | 16 | 26 => Self::NotStarted,
            2 | 4 | 6 | 9 | 21 | 22 | 25 => Self::Live,
            3 => Self::HalfTime,
            5 => Self::Finished,
            7 => Self::FinishedAfterExtraTime,
            8 => Self::FinishedAfterPenalties,
            10 => Self::Postponed,
            11 | 18 => Self::Interrupted,
            12 | 20 => Self::Cancelled,
            14 | 17 => Self::Awarded,
            15 => Self::Abandoned,
            _ => Self::Unknown,
        }
    }

    /// Accepts both our stored codes and the provider's `short_name` /
    /// `developer_name` spellings.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        match code.as_str() {
            "NS" | "TBA" | "DELAYED" | "PENDING" => Self::NotStarted,
            "LIVE" | "BREAK" | "ET" | "INPLAY_ET" | "INPLAY_PENALTIES" | "PEN_BREAK"
            | "EXTRA_TIME_BREAK" | "1ST" | "2ND" | "INPLAY_1ST_HALF" | "INPLAY_2ND_HALF" => {
                Self::Live
            }
            "HT" => Self::HalfTime,
            "FT" => Self::Finished,
            "AET" => Self::FinishedAfterExtraTime,
            "FT_PEN" | "PEN" => Self::FinishedAfterPenalties,
            "POSTP" | "POSTPONED" => Self::Postponed,
            "CANC" | "CANCELLED" | "DELETED" => Self::Cancelled,
            "ABAN" | "ABD" | "ABANDONED" => Self::Abandoned,
            "AWARDED" | "AWD" | "WO" => Self::Awarded,
            "INT" | "INTERRUPTED" | "SUSP" | "SUSPENDED" => Self::Interrupted,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::NotStarted => "NS",
            Self::Live => "LIVE",
            Self::HalfTime => "HT",
            Self::Finished => "FT",
            Self::FinishedAfterExtraTime => "AET",
            Self::FinishedAfterPenalties => "FT_PEN",
            Self::Postponed => "POSTP",
            Self::Cancelled => "CANC",
            Self::Abandoned => "ABAN",
            Self::Awarded => "AWARDED",
            Self::Interrupted => "INT",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_finished(self) -> bool {
        Self::FINISHED.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
    Unknown,
}

impl Outcome {
    pub fn from_scores(status: FixtureStatus, home: Option<i64>, away: Option<i64>) -> Self {
        let (Some(home), Some(away)) = (home, away) else {
            return Self::Unknown;
        };
        if !status.is_finished() {
            return Self::Unknown;
        }
        if home > away {
            Self::HomeWin
        } else if home < away {
            Self::AwayWin
        } else {
            Self::Draw
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::HomeWin => "H",
            Self::Draw => "D",
            Self::AwayWin => "A",
            Self::Unknown => "U",
        }
    }
}

/// Match segment a statistics row is aggregated over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    FirstHalf,
    SecondHalf,
    ExtraTime,
    Penalties,
    Other(String),
}

impl Period {
    /// Case-insensitive marker match on the provider's free-text description.
    /// Unrecognised descriptions are kept verbatim.
    pub fn from_description(description: &str) -> Self {
        let lower = description.to_ascii_lowercase();
        if lower.contains("1st-half") || lower.contains("first half") {
            Self::FirstHalf
        } else if lower.contains("2nd-half") || lower.contains("second half") {
            Self::SecondHalf
        } else if lower.contains("extra-time") || lower.contains("extra time") {
            Self::ExtraTime
        } else if lower.contains("penalties") {
            Self::Penalties
        } else {
            Self::Other(description.to_string())
        }
    }

    /// Inverse of [`Period::label`], used when reading rows back.
    pub fn from_label(label: &str) -> Self {
        match label {
            "first_half" => Self::FirstHalf,
            "second_half" => Self::SecondHalf,
            "extra_time" => Self::ExtraTime,
            "penalties" => Self::Penalties,
            other => Self::Other(
                other
                    .strip_prefix(OTHER_PREFIX)
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }

    /// Stored `period` value. Unmapped descriptions carry an `other:` prefix
    /// so they never equal one of the fixed labels.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::FirstHalf => Cow::Borrowed("first_half"),
            Self::SecondHalf => Cow::Borrowed("second_half"),
            Self::ExtraTime => Cow::Borrowed("extra_time"),
            Self::Penalties => Cow::Borrowed("penalties"),
            Self::Other(raw) => Cow::Owned(format!("{OTHER_PREFIX}{raw}")),
        }
    }
}

const OTHER_PREFIX: &str = "other:";

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Integer,
    Percent,
}

/// Every statistic column of `fixture_stats`, in schema order. The
/// snake_case variant name is the column name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumCount,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum StatColumn {
    Goals,
    Corners,
    BallPossession,
    ShotsTotal,
    ShotsOnTarget,
    ShotsOffTarget,
    ShotsBlocked,
    ShotsInsidebox,
    ShotsOutsidebox,
    Fouls,
    YellowCards,
    RedCards,
    YellowRedCards,
    Offsides,
    Saves,
    HitWoodwork,
    Substitutions,
    SuccessfulDribbles,
    SuccessfulDribblesPercentage,
    DribbleAttempts,
    SuccessfulPasses,
    SuccessfulPassesPercentage,
    Passes,
    AccurateCrosses,
    TotalCrosses,
    Throwins,
    Assists,
    Penalties,
    Attacks,
    DangerousAttacks,
    Challenges,
    KeyPasses,
    Tackles,
    Interceptions,
}

pub const STAT_COLUMN_COUNT: usize = <StatColumn as EnumCount>::COUNT;

impl StatColumn {
    /// Translates the provider's hyphenated type code. `None` means the code
    /// is not tracked.
    pub fn from_api_code(code: &str) -> Option<Self> {
        let column = match code.trim().to_ascii_lowercase().as_str() {
            "goals" => Self::Goals,
            "corners" => Self::Corners,
            "ball-possession" => Self::BallPossession,
            "shots-total" => Self::ShotsTotal,
            "shots-on-target" => Self::ShotsOnTarget,
            "shots-off-target" => Self::ShotsOffTarget,
            "shots-blocked" => Self::ShotsBlocked,
            "shots-insidebox" => Self::ShotsInsidebox,
            "shots-outsidebox" => Self::ShotsOutsidebox,
            "fouls" => Self::Fouls,
            "yellowcards" => Self::YellowCards,
            "redcards" => Self::RedCards,
            "yellowred-cards" => Self::YellowRedCards,
            "offsides" => Self::Offsides,
            "saves" => Self::Saves,
            "hit-woodwork" => Self::HitWoodwork,
            "substitutions" => Self::Substitutions,
            "successful-dribbles" => Self::SuccessfulDribbles,
            "successful-dribbles-percentage" => Self::SuccessfulDribblesPercentage,
            "dribble-attempts" => Self::DribbleAttempts,
            "successful-passes" => Self::SuccessfulPasses,
            "successful-passes-percentage" => Self::SuccessfulPassesPercentage,
            "passes" | "passes-total" => Self::Passes,
            "accurate-crosses" => Self::AccurateCrosses,
            "total-crosses" | "crosses-total" => Self::TotalCrosses,
            "throwins" => Self::Throwins,
            "assists" => Self::Assists,
            "penalties" => Self::Penalties,
            "attacks" => Self::Attacks,
            "dangerous-attacks" => Self::DangerousAttacks,
            "challenges" => Self::Challenges,
            "key-passes" => Self::KeyPasses,
            "tackles" => Self::Tackles,
            "interceptions" => Self::Interceptions,
            _ => return None,
        };
        Some(column)
    }

    pub fn kind(self) -> StatKind {
        match self {
            Self::BallPossession
            | Self::SuccessfulDribblesPercentage
            | Self::SuccessfulPassesPercentage => StatKind::Percent,
            _ => StatKind::Integer,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn all() -> impl Iterator<Item = StatColumn> {
        Self::iter()
    }
}

impl fmt::Display for StatColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Int(i64),
    Float(f64),
}

impl StatValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// One team's statistics for one period of one fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub fixture_id: u64,
    pub team_id: u64,
    pub period: Period,
    pub recorded_at: String,
    values: [Option<StatValue>; STAT_COLUMN_COUNT],
}

impl StatRow {
    pub fn new(fixture_id: u64, team_id: u64, period: Period, recorded_at: &str) -> Self {
        Self {
            fixture_id,
            team_id,
            period,
            recorded_at: recorded_at.to_string(),
            values: [None; STAT_COLUMN_COUNT],
        }
    }

    pub fn get(&self, column: StatColumn) -> Option<StatValue> {
        self.values[column.index()]
    }

    /// Stores `value` only when it matches the column's declared kind.
    pub fn set(&mut self, column: StatColumn, value: Option<StatValue>) {
        let value = match (column.kind(), value) {
            (StatKind::Integer, Some(StatValue::Int(v))) => Some(StatValue::Int(v)),
            (StatKind::Percent, Some(StatValue::Float(v))) => Some(StatValue::Float(v)),
            (StatKind::Percent, Some(StatValue::Int(v))) => Some(StatValue::Float(v as f64)),
            _ => None,
        };
        self.values[column.index()] = value;
    }

    pub fn values(&self) -> impl Iterator<Item = (StatColumn, Option<StatValue>)> + '_ {
        StatColumn::iter().map(|c| (c, self.get(c)))
    }

    pub fn all_null(&self, columns: &[StatColumn]) -> bool {
        columns.iter().all(|c| self.get(*c).is_none())
    }
}

/// One priced outcome of a pre-match market.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsRow {
    pub odds_id: Option<u64>,
    pub fixture_id: u64,
    pub market_id: u64,
    pub bookmaker_id: u64,
    pub label: String,
    pub handicap: String,
    pub total: String,
    pub name: Option<String>,
    pub market_description: Option<String>,
    pub price: Option<f64>,
    pub probability: Option<f64>,
    pub fractional: Option<String>,
    pub american: Option<String>,
    pub winning: bool,
    pub stopped: bool,
    pub bookmaker_updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub fixture_id: u64,
    pub league_id: Option<u64>,
    pub season_id: u64,
    pub stage_id: Option<u64>,
    pub round_id: Option<u64>,
    pub round_finished: Option<bool>,
    pub starting_at: Option<String>,
    pub status: FixtureStatus,
    pub home_team_id: Option<u64>,
    pub away_team_id: Option<u64>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

impl Fixture {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_scores(self.status, self.home_score, self.away_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct League {
    pub league_id: u64,
    pub sport_id: Option<u64>,
    pub country_id: Option<u64>,
    pub name: String,
    pub active: bool,
    pub short_code: Option<String>,
    pub image_path: Option<String>,
    pub league_type: Option<String>,
    pub sub_type: Option<String>,
    pub last_played_at: Option<String>,
    pub category: Option<i64>,
    pub current_season_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Season {
    pub season_id: u64,
    pub league_id: u64,
    pub sport_id: Option<u64>,
    pub name: String,
    pub is_current: bool,
    pub finished: bool,
    pub pending: bool,
    pub starting_at: Option<String>,
    pub ending_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub team_id: u64,
    pub name: String,
    pub short_code: Option<String>,
    pub country_id: Option<u64>,
    pub logo_url: Option<String>,
    pub venue_id: Option<u64>,
    pub founded: Option<i64>,
    pub team_type: Option<String>,
    pub national_team: bool,
}

/// One per-minute pressure reading for a team, stored in `fixture_timeline`.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureRow {
    pub fixture_id: u64,
    pub team_id: u64,
    pub minute: i64,
    pub pressure_index: f64,
    pub recorded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn period_descriptions_map_to_labels() {
        assert_eq!(Period::from_description("1st-half"), Period::FirstHalf);
        assert_eq!(Period::from_description("First Half"), Period::FirstHalf);
        assert_eq!(Period::from_description("2ND-HALF"), Period::SecondHalf);
        assert_eq!(Period::from_description("extra-time"), Period::ExtraTime);
        assert_eq!(Period::from_description("Penalties"), Period::Penalties);
        assert_eq!(
            Period::from_description("Full-Time"),
            Period::Other("Full-Time".to_string())
        );
    }

    #[test]
    fn unmapped_label_cannot_collide_with_fixed_labels() {
        let odd = Period::from_description("first_half");
        assert_eq!(odd, Period::Other("first_half".to_string()));
        assert_eq!(odd.label(), "other:first_half");
        assert_ne!(odd.label(), Period::FirstHalf.label());
        assert_eq!(Period::from_label(&odd.label()), odd);
        assert_eq!(Period::from_label("first_half"), Period::FirstHalf);
    }

    #[test]
    fn column_names_are_snake_case_and_round_trip() {
        assert_eq!(StatColumn::BallPossession.name(), "ball_possession");
        assert_eq!(StatColumn::ShotsInsidebox.name(), "shots_insidebox");
        assert_eq!(StatColumn::YellowRedCards.name(), "yellow_red_cards");
        for column in StatColumn::all() {
            assert!(!column.name().contains('-'));
            assert_eq!(StatColumn::from_str(column.name()).ok(), Some(column));
        }
    }

    #[test]
    fn unmapped_api_code_is_none() {
        assert_eq!(StatColumn::from_api_code("goals"), Some(StatColumn::Goals));
        assert_eq!(
            StatColumn::from_api_code("crosses-total"),
            Some(StatColumn::TotalCrosses)
        );
        assert_eq!(StatColumn::from_api_code("expected-goals-xg"), None);
    }

    #[test]
    fn set_rejects_wrong_kind() {
        let mut row = StatRow::new(1, 2, Period::FirstHalf, "t");
        row.set(StatColumn::Goals, Some(StatValue::Float(1.5)));
        assert_eq!(row.get(StatColumn::Goals), None);
        row.set(StatColumn::BallPossession, Some(StatValue::Int(55)));
        assert_eq!(
            row.get(StatColumn::BallPossession),
            Some(StatValue::Float(55.0))
        );
    }

    #[test]
    fn outcome_requires_finished_status() {
        assert_eq!(
            Outcome::from_scores(FixtureStatus::Finished, Some(2), Some(1)),
            Outcome::HomeWin
        );
        assert_eq!(
            Outcome::from_scores(FixtureStatus::Live, Some(2), Some(1)),
            Outcome::Unknown
        );
        assert_eq!(
            Outcome::from_scores(FixtureStatus::FinishedAfterPenalties, Some(1), Some(1)),
            Outcome::Draw
        );
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            FixtureStatus::NotStarted,
            FixtureStatus::Live,
            FixtureStatus::HalfTime,
            FixtureStatus::Finished,
            FixtureStatus::FinishedAfterExtraTime,
            FixtureStatus::FinishedAfterPenalties,
            FixtureStatus::Postponed,
            FixtureStatus::Cancelled,
            FixtureStatus::Abandoned,
            FixtureStatus::Awarded,
            FixtureStatus::Interrupted,
            FixtureStatus::Unknown,
        ] {
            assert_eq!(FixtureStatus::from_code(status.code()), status);
        }
        assert_eq!(FixtureStatus::from_state_id(5), FixtureStatus::Finished);
        assert_eq!(FixtureStatus::from_state_id(999), FixtureStatus::Unknown);
    }
}
