use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};

use crate::model::{
    Fixture, FixtureStatus, League, OddsRow, Period, PressureRow, Season, StatColumn, StatKind,
    StatRow, StatValue, Team,
};

/// Outcome of one batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub inserted: usize,
    pub updated: usize,
    pub ignored: usize,
}

impl WriteCounts {
    pub fn absorb(&mut self, other: WriteCounts) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.ignored += other.ignored;
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create db directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS leagues (
            league_id INTEGER PRIMARY KEY,
            sport_id INTEGER NULL,
            country_id INTEGER NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL,
            short_code TEXT NULL,
            image_path TEXT NULL,
            type TEXT NULL,
            sub_type TEXT NULL,
            last_played_at TEXT NULL,
            category INTEGER NULL,
            current_season_id INTEGER NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS seasons (
            season_id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            sport_id INTEGER NULL,
            name TEXT NOT NULL,
            is_current INTEGER NOT NULL,
            finished INTEGER NOT NULL,
            pending INTEGER NOT NULL,
            starting_at TEXT NULL,
            ending_at TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_seasons_league ON seasons(league_id);

        CREATE TABLE IF NOT EXISTS teams (
            team_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            short_code TEXT NULL,
            country_id INTEGER NULL,
            logo_url TEXT NULL,
            venue_id INTEGER NULL,
            founded INTEGER NULL,
            type TEXT NULL,
            national_team INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fixtures (
            fixture_id INTEGER PRIMARY KEY,
            league_id INTEGER NULL,
            season_id INTEGER NOT NULL,
            stage_id INTEGER NULL,
            round_id INTEGER NULL,
            round_finished INTEGER NULL,
            starting_at TEXT NULL,
            status TEXT NOT NULL,
            home_team_id INTEGER NULL,
            away_team_id INTEGER NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            outcome TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fixtures_season ON fixtures(season_id);
        CREATE INDEX IF NOT EXISTS idx_fixtures_status ON fixtures(status);

        CREATE TABLE IF NOT EXISTS fixture_odds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            odds_id INTEGER NULL,
            fixture_id INTEGER NOT NULL,
            market_id INTEGER NOT NULL,
            bookmaker_id INTEGER NOT NULL,
            label TEXT NOT NULL,
            handicap TEXT NOT NULL DEFAULT '',
            total TEXT NOT NULL DEFAULT '',
            name TEXT NULL,
            market_description TEXT NULL,
            price REAL NULL,
            probability REAL NULL,
            fractional TEXT NULL,
            american TEXT NULL,
            winning INTEGER NOT NULL,
            stopped INTEGER NOT NULL,
            bookmaker_updated_at TEXT NULL,
            recorded_at TEXT NOT NULL,
            UNIQUE(fixture_id, market_id, bookmaker_id, label, handicap, total)
        );
        CREATE INDEX IF NOT EXISTS idx_fixture_odds_fixture ON fixture_odds(fixture_id);

        CREATE TABLE IF NOT EXISTS fixture_timeline (
            timeline_id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            minute INTEGER NOT NULL,
            pressure_index REAL NULL,
            recorded_at TEXT NOT NULL,
            UNIQUE(fixture_id, team_id, event_type, minute)
        );
        CREATE INDEX IF NOT EXISTS idx_fixture_timeline_fixture ON fixture_timeline(fixture_id, event_type);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            targeted INTEGER NOT NULL,
            processed INTEGER NOT NULL,
            failed INTEGER NOT NULL,
            rows_written INTEGER NOT NULL,
            rows_ignored INTEGER NOT NULL,
            interrupted INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    conn.execute_batch(&fixture_stats_ddl())
        .context("create fixture_stats table")?;
    Ok(())
}

fn fixture_stats_ddl() -> String {
    let mut ddl = String::from(
        "CREATE TABLE IF NOT EXISTS fixture_stats (\n\
         id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         fixture_id INTEGER NOT NULL,\n\
         team_id INTEGER NOT NULL,\n\
         period TEXT NOT NULL,\n",
    );
    for column in StatColumn::all() {
        let sql_type = match column.kind() {
            StatKind::Integer => "INTEGER",
            StatKind::Percent => "REAL",
        };
        ddl.push_str(&format!("{} {sql_type} NULL,\n", column.name()));
    }
    ddl.push_str(
        "recorded_at TEXT NOT NULL,\n\
         UNIQUE(fixture_id, team_id, period)\n);\n\
         CREATE INDEX IF NOT EXISTS idx_fixture_stats_period ON fixture_stats(period, fixture_id);",
    );
    ddl
}

fn stat_sql_value(v: Option<StatValue>) -> SqlValue {
    match v {
        Some(StatValue::Int(n)) => SqlValue::Integer(n),
        Some(StatValue::Float(f)) => SqlValue::Real(f),
        None => SqlValue::Null,
    }
}

fn u64_sql(v: u64) -> SqlValue {
    SqlValue::Integer(v as i64)
}

fn opt_u64_sql(v: Option<u64>) -> SqlValue {
    v.map(u64_sql).unwrap_or(SqlValue::Null)
}

fn opt_text_sql(v: &Option<String>) -> SqlValue {
    v.clone().map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

/// Statistics rows are write-once: an existing (fixture, team, period) row
/// is left untouched and counted as ignored.
pub fn insert_stat_rows(conn: &mut Connection, rows: &[StatRow]) -> Result<WriteCounts> {
    let columns = StatColumn::all().map(|c| c.name()).collect::<Vec<_>>();
    let placeholders = (1..=columns.len() + 4)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT OR IGNORE INTO fixture_stats (fixture_id, team_id, period, recorded_at, {}) VALUES ({placeholders})",
        columns.join(", ")
    );

    let tx = conn.transaction().context("begin stats transaction")?;
    let mut counts = WriteCounts::default();
    {
        let mut stmt = tx.prepare(&sql).context("prepare stats insert")?;
        for row in rows {
            let mut values = vec![
                u64_sql(row.fixture_id),
                u64_sql(row.team_id),
                SqlValue::Text(row.period.label().into_owned()),
                SqlValue::Text(row.recorded_at.clone()),
            ];
            values.extend(row.values().map(|(_, v)| stat_sql_value(v)));
            let changed = stmt
                .execute(params_from_iter(values))
                .with_context(|| format!("insert stats for fixture {}", row.fixture_id))?;
            if changed == 0 {
                counts.ignored += 1;
            } else {
                counts.inserted += 1;
            }
        }
    }
    tx.commit().context("commit stats transaction")?;
    Ok(counts)
}

pub fn insert_odds_rows(conn: &mut Connection, rows: &[OddsRow]) -> Result<WriteCounts> {
    let recorded_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin odds transaction")?;
    let mut counts = WriteCounts::default();
    {
        let mut stmt = tx
            .prepare(
                r#"
                INSERT OR IGNORE INTO fixture_odds (
                    odds_id, fixture_id, market_id, bookmaker_id, label, handicap, total,
                    name, market_description, price, probability, fractional, american,
                    winning, stopped, bookmaker_updated_at, recorded_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17
                )
                "#,
            )
            .context("prepare odds insert")?;
        for row in rows {
            let values = vec![
                opt_u64_sql(row.odds_id),
                u64_sql(row.fixture_id),
                u64_sql(row.market_id),
                u64_sql(row.bookmaker_id),
                SqlValue::Text(row.label.clone()),
                SqlValue::Text(row.handicap.clone()),
                SqlValue::Text(row.total.clone()),
                opt_text_sql(&row.name),
                opt_text_sql(&row.market_description),
                row.price.map(SqlValue::Real).unwrap_or(SqlValue::Null),
                row.probability.map(SqlValue::Real).unwrap_or(SqlValue::Null),
                opt_text_sql(&row.fractional),
                opt_text_sql(&row.american),
                SqlValue::Integer(bool_to_i64(row.winning)),
                SqlValue::Integer(bool_to_i64(row.stopped)),
                opt_text_sql(&row.bookmaker_updated_at),
                SqlValue::Text(recorded_at.clone()),
            ];
            let changed = stmt
                .execute(params_from_iter(values))
                .with_context(|| format!("insert odds for fixture {}", row.fixture_id))?;
            if changed == 0 {
                counts.ignored += 1;
            } else {
                counts.inserted += 1;
            }
        }
    }
    tx.commit().context("commit odds transaction")?;
    Ok(counts)
}

/// Pressure readings are write-once per (fixture, team, minute).
pub fn insert_pressure_rows(conn: &mut Connection, rows: &[PressureRow]) -> Result<WriteCounts> {
    let tx = conn.transaction().context("begin pressure transaction")?;
    let mut counts = WriteCounts::default();
    {
        let mut stmt = tx
            .prepare(
                "INSERT OR IGNORE INTO fixture_timeline (fixture_id, team_id, event_type, minute, pressure_index, recorded_at)
                 VALUES (?1, ?2, 'pressure', ?3, ?4, ?5)",
            )
            .context("prepare pressure insert")?;
        for row in rows {
            let changed = stmt
                .execute(params![
                    row.fixture_id as i64,
                    row.team_id as i64,
                    row.minute,
                    row.pressure_index,
                    row.recorded_at,
                ])
                .with_context(|| format!("insert pressure for fixture {}", row.fixture_id))?;
            if changed == 0 {
                counts.ignored += 1;
            } else {
                counts.inserted += 1;
            }
        }
    }
    tx.commit().context("commit pressure transaction")?;
    Ok(counts)
}

fn exists(tx: &Transaction<'_>, sql: &str, id: u64) -> Result<bool> {
    let found = tx
        .query_row(sql, params![id as i64], |_| Ok(()))
        .optional()
        .context("existence check")?;
    Ok(found.is_some())
}

fn tally(counts: &mut WriteCounts, existed: bool) {
    if existed {
        counts.updated += 1;
    } else {
        counts.inserted += 1;
    }
}

/// Fixtures are mutable: a re-ingested fixture replaces the stored row and
/// bumps `updated_at`.
pub fn upsert_fixtures(conn: &mut Connection, rows: &[Fixture]) -> Result<WriteCounts> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin fixtures transaction")?;
    let mut counts = WriteCounts::default();
    for f in rows {
        let existed = exists(&tx, "SELECT 1 FROM fixtures WHERE fixture_id = ?1", f.fixture_id)?;
        tx.execute(
            r#"
            INSERT INTO fixtures (
                fixture_id, league_id, season_id, stage_id, round_id, round_finished,
                starting_at, status, home_team_id, away_team_id, home_score, away_score,
                outcome, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(fixture_id) DO UPDATE SET
                league_id = COALESCE(excluded.league_id, fixtures.league_id),
                season_id = excluded.season_id,
                stage_id = COALESCE(excluded.stage_id, fixtures.stage_id),
                round_id = COALESCE(excluded.round_id, fixtures.round_id),
                round_finished = excluded.round_finished,
                starting_at = excluded.starting_at,
                status = excluded.status,
                home_team_id = COALESCE(excluded.home_team_id, fixtures.home_team_id),
                away_team_id = COALESCE(excluded.away_team_id, fixtures.away_team_id),
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                outcome = excluded.outcome,
                updated_at = excluded.updated_at
            "#,
            params![
                f.fixture_id as i64,
                f.league_id.map(|v| v as i64),
                f.season_id as i64,
                f.stage_id.map(|v| v as i64),
                f.round_id.map(|v| v as i64),
                f.round_finished.map(bool_to_i64),
                f.starting_at,
                f.status.code(),
                f.home_team_id.map(|v| v as i64),
                f.away_team_id.map(|v| v as i64),
                f.home_score,
                f.away_score,
                f.outcome().code(),
                now,
            ],
        )
        .with_context(|| format!("upsert fixture {}", f.fixture_id))?;
        tally(&mut counts, existed);
    }
    tx.commit().context("commit fixtures transaction")?;
    Ok(counts)
}

pub fn upsert_leagues(conn: &mut Connection, rows: &[League]) -> Result<WriteCounts> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin leagues transaction")?;
    let mut counts = WriteCounts::default();
    for l in rows {
        let existed = exists(&tx, "SELECT 1 FROM leagues WHERE league_id = ?1", l.league_id)?;
        tx.execute(
            r#"
            INSERT INTO leagues (
                league_id, sport_id, country_id, name, active, short_code, image_path,
                type, sub_type, last_played_at, category, current_season_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(league_id) DO UPDATE SET
                sport_id = excluded.sport_id,
                country_id = excluded.country_id,
                name = excluded.name,
                active = excluded.active,
                short_code = excluded.short_code,
                image_path = excluded.image_path,
                type = excluded.type,
                sub_type = excluded.sub_type,
                last_played_at = excluded.last_played_at,
                category = excluded.category,
                current_season_id = excluded.current_season_id,
                updated_at = excluded.updated_at
            "#,
            params![
                l.league_id as i64,
                l.sport_id.map(|v| v as i64),
                l.country_id.map(|v| v as i64),
                l.name,
                bool_to_i64(l.active),
                l.short_code,
                l.image_path,
                l.league_type,
                l.sub_type,
                l.last_played_at,
                l.category,
                l.current_season_id.map(|v| v as i64),
                now,
            ],
        )
        .with_context(|| format!("upsert league {}", l.league_id))?;
        tally(&mut counts, existed);
    }
    tx.commit().context("commit leagues transaction")?;
    Ok(counts)
}

pub fn upsert_seasons(conn: &mut Connection, rows: &[Season]) -> Result<WriteCounts> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin seasons transaction")?;
    let mut counts = WriteCounts::default();
    for s in rows {
        let existed = exists(&tx, "SELECT 1 FROM seasons WHERE season_id = ?1", s.season_id)?;
        tx.execute(
            r#"
            INSERT INTO seasons (
                season_id, league_id, sport_id, name, is_current, finished, pending,
                starting_at, ending_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(season_id) DO UPDATE SET
                league_id = excluded.league_id,
                sport_id = excluded.sport_id,
                name = excluded.name,
                is_current = excluded.is_current,
                finished = excluded.finished,
                pending = excluded.pending,
                starting_at = excluded.starting_at,
                ending_at = excluded.ending_at,
                updated_at = excluded.updated_at
            "#,
            params![
                s.season_id as i64,
                s.league_id as i64,
                s.sport_id.map(|v| v as i64),
                s.name,
                bool_to_i64(s.is_current),
                bool_to_i64(s.finished),
                bool_to_i64(s.pending),
                s.starting_at,
                s.ending_at,
                now,
            ],
        )
        .with_context(|| format!("upsert season {}", s.season_id))?;
        tally(&mut counts, existed);
    }
    tx.commit().context("commit seasons transaction")?;
    Ok(counts)
}

pub fn upsert_teams(conn: &mut Connection, rows: &[Team]) -> Result<WriteCounts> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin teams transaction")?;
    let mut counts = WriteCounts::default();
    for t in rows {
        let existed = exists(&tx, "SELECT 1 FROM teams WHERE team_id = ?1", t.team_id)?;
        tx.execute(
            r#"
            INSERT INTO teams (
                team_id, name, short_code, country_id, logo_url, venue_id, founded,
                type, national_team, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(team_id) DO UPDATE SET
                name = excluded.name,
                short_code = excluded.short_code,
                country_id = excluded.country_id,
                logo_url = excluded.logo_url,
                venue_id = excluded.venue_id,
                founded = excluded.founded,
                type = excluded.type,
                national_team = excluded.national_team,
                updated_at = excluded.updated_at
            "#,
            params![
                t.team_id as i64,
                t.name,
                t.short_code,
                t.country_id.map(|v| v as i64),
                t.logo_url,
                t.venue_id.map(|v| v as i64),
                t.founded,
                t.team_type,
                bool_to_i64(t.national_team),
                now,
            ],
        )
        .with_context(|| format!("upsert team {}", t.team_id))?;
        tally(&mut counts, existed);
    }
    tx.commit().context("commit teams transaction")?;
    Ok(counts)
}

fn finished_codes_sql() -> String {
    FixtureStatus::FINISHED
        .iter()
        .map(|s| format!("'{}'", s.code()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn limit_sql(limit: Option<usize>) -> i64 {
    limit.map(|n| n as i64).unwrap_or(-1)
}

fn collect_ids(conn: &Connection, sql: &str, limit: Option<usize>) -> Result<Vec<u64>> {
    let mut stmt = conn.prepare(sql).context("prepare id query")?;
    let rows = stmt
        .query_map(params![limit_sql(limit)], |row| row.get::<_, i64>(0))
        .context("query ids")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode id")? as u64);
    }
    Ok(out)
}

/// Finished fixtures (or fixtures in a finished round) with no statistics
/// rows yet, most recent first.
pub fn pending_stats_fixture_ids(conn: &Connection, limit: Option<usize>) -> Result<Vec<u64>> {
    let sql = format!(
        r#"
        SELECT f.fixture_id
        FROM fixtures f
        WHERE (f.status IN ({}) OR f.round_finished = 1)
          AND NOT EXISTS (SELECT 1 FROM fixture_stats s WHERE s.fixture_id = f.fixture_id)
        ORDER BY f.starting_at DESC, f.fixture_id DESC
        LIMIT ?1
        "#,
        finished_codes_sql()
    );
    collect_ids(conn, &sql, limit)
}

pub fn pending_odds_fixture_ids(conn: &Connection, limit: Option<usize>) -> Result<Vec<u64>> {
    let sql = format!(
        r#"
        SELECT f.fixture_id
        FROM fixtures f
        WHERE f.status IN ({})
          AND NOT EXISTS (SELECT 1 FROM fixture_odds o WHERE o.fixture_id = f.fixture_id)
        ORDER BY f.starting_at DESC, f.fixture_id DESC
        LIMIT ?1
        "#,
        finished_codes_sql()
    );
    collect_ids(conn, &sql, limit)
}

pub fn pending_pressure_fixture_ids(conn: &Connection, limit: Option<usize>) -> Result<Vec<u64>> {
    let sql = format!(
        r#"
        SELECT f.fixture_id
        FROM fixtures f
        WHERE f.status IN ({})
          AND NOT EXISTS (
              SELECT 1 FROM fixture_timeline t
              WHERE t.fixture_id = f.fixture_id AND t.event_type = 'pressure'
          )
        ORDER BY f.starting_at DESC, f.fixture_id DESC
        LIMIT ?1
        "#,
        finished_codes_sql()
    );
    collect_ids(conn, &sql, limit)
}

/// Seasons still worth scheduling: unfinished or flagged current.
pub fn active_season_ids(conn: &Connection) -> Result<Vec<u64>> {
    collect_ids(
        conn,
        "SELECT season_id FROM seasons WHERE finished = 0 OR is_current = 1 ORDER BY season_id LIMIT ?1",
        None,
    )
}

pub fn load_stat_rows(conn: &Connection, fixture_id: u64) -> Result<Vec<StatRow>> {
    let columns = StatColumn::all().collect::<Vec<_>>();
    let names = columns.iter().map(|c| c.name()).collect::<Vec<_>>();
    let sql = format!(
        "SELECT fixture_id, team_id, period, recorded_at, {} FROM fixture_stats WHERE fixture_id = ?1 ORDER BY period, team_id",
        names.join(", ")
    );
    let mut stmt = conn.prepare(&sql).context("prepare load stats query")?;
    let rows = stmt
        .query_map(params![fixture_id as i64], |row| {
            let period: String = row.get(2)?;
            let recorded_at: String = row.get(3)?;
            let mut out = StatRow::new(
                row.get::<_, i64>(0)? as u64,
                row.get::<_, i64>(1)? as u64,
                Period::from_label(&period),
                &recorded_at,
            );
            for (idx, column) in columns.iter().enumerate() {
                let value = match row.get::<_, SqlValue>(idx + 4)? {
                    SqlValue::Integer(n) => Some(StatValue::Int(n)),
                    SqlValue::Real(f) => Some(StatValue::Float(f)),
                    _ => None,
                };
                out.set(*column, value);
            }
            Ok(out)
        })
        .context("query stats rows")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode stats row")?);
    }
    Ok(out)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    let n = conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .with_context(|| format!("count rows in {table}"))?;
    Ok(n as u64)
}

/// Totals recorded against an `ingest_runs` row when a sync finishes.
#[derive(Debug, Clone, Default)]
pub struct RunTotals {
    pub processed: usize,
    pub failed: usize,
    pub rows_written: usize,
    pub rows_ignored: usize,
    pub interrupted: bool,
    pub errors: Vec<String>,
}

pub fn begin_run(conn: &Connection, kind: &str, targeted: usize) -> Result<i64> {
    conn.execute(
        "INSERT INTO ingest_runs(kind, started_at, finished_at, targeted, processed, failed, rows_written, rows_ignored, interrupted, errors_json)
         VALUES (?1, ?2, NULL, ?3, 0, 0, 0, 0, 0, '[]')",
        params![kind, Utc::now().to_rfc3339(), targeted as i64],
    )
    .context("insert ingest run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(conn: &Connection, run_id: i64, totals: &RunTotals) -> Result<()> {
    let errors_json = serde_json::to_string(&totals.errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, processed = ?2, failed = ?3, rows_written = ?4,
             rows_ignored = ?5, interrupted = ?6, errors_json = ?7
         WHERE run_id = ?8",
        params![
            Utc::now().to_rfc3339(),
            totals.processed as i64,
            totals.failed as i64,
            totals.rows_written as i64,
            totals.rows_ignored as i64,
            bool_to_i64(totals.interrupted),
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;
    Ok(())
}
