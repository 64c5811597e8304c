use std::thread;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{info, warn};

use crate::archive::RawArchive;
use crate::config::PipelineConfig;
use crate::fixtures::{normalize_league, normalize_schedule, normalize_team};
use crate::http_client::{Fetch, fetch_all_pages};
use crate::odds::normalize_prematch_odds;
use crate::pressure::normalize_pressure_now;
use crate::shutdown::InterruptFlag;
use crate::stats::normalize_fixture_stats_now;
use crate::store::{self, RunTotals, WriteCounts};

const STATS_INCLUDE: &str = "periods.statistics.type";

/// Everything a sync run needs, built once by the caller.
pub struct SyncContext<'a> {
    pub conn: &'a mut Connection,
    pub fetcher: &'a dyn Fetch,
    pub config: &'a PipelineConfig,
    pub archive: &'a RawArchive,
    pub interrupt: &'a InterruptFlag,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub kind: &'static str,
    pub targeted: usize,
    pub processed: usize,
    /// Items fetched fine that produced no rows.
    pub empty: usize,
    /// Records dropped by the normalizer (missing id or name).
    pub skipped: usize,
    pub failed: Vec<(u64, String)>,
    pub rows_normalized: usize,
    pub writes: WriteCounts,
    pub interrupted: bool,
    pub errors: Vec<String>,
}

impl RunSummary {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn totals(&self) -> RunTotals {
        let mut errors = self
            .failed
            .iter()
            .map(|(id, err)| format!("{id}: {err}"))
            .collect::<Vec<_>>();
        errors.extend(self.errors.iter().cloned());
        RunTotals {
            processed: self.processed,
            failed: self.failed.len(),
            rows_written: self.writes.written(),
            rows_ignored: self.writes.ignored,
            interrupted: self.interrupted,
            errors,
        }
    }
}

/// Fetch-normalize-store loop shared by the per-id syncs. Item failures are
/// recorded and skipped; rows are flushed every `batch_size` and on exit.
fn run_items<R>(
    ctx: &mut SyncContext<'_>,
    kind: &'static str,
    ids: &[u64],
    mut load: impl FnMut(&dyn Fetch, &RawArchive, u64) -> Result<Vec<R>>,
    mut flush: impl FnMut(&mut Connection, &[R]) -> Result<WriteCounts>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(kind);
    summary.targeted = ids.len();
    let run_id = store::begin_run(ctx.conn, kind, ids.len())?;
    let batch_size = ctx.config.batch_size.max(1);
    let mut pending: Vec<R> = Vec::new();

    for (idx, id) in ids.iter().copied().enumerate() {
        if ctx.interrupt.is_set() {
            warn!(kind, remaining = ids.len() - idx, "interrupted; stopping early");
            summary.interrupted = true;
            break;
        }
        info!(kind, id, progress = %format!("{}/{}", idx + 1, ids.len()), "fetching");

        match load(ctx.fetcher, ctx.archive, id) {
            Ok(rows) if rows.is_empty() => {
                summary.processed += 1;
                summary.empty += 1;
                info!(kind, id, "no rows");
            }
            Ok(rows) => {
                summary.processed += 1;
                summary.rows_normalized += rows.len();
                pending.extend(rows);
            }
            Err(err) => {
                warn!(kind, id, error = %format!("{err:#}"), "item failed");
                summary.failed.push((id, format!("{err:#}")));
            }
        }

        if pending.len() >= batch_size {
            flush_pending(ctx.conn, &mut pending, &mut flush, &mut summary);
        }
        if idx + 1 < ids.len() && !ctx.config.api_delay.is_zero() {
            thread::sleep(ctx.config.api_delay);
        }
    }
    flush_pending(ctx.conn, &mut pending, &mut flush, &mut summary);

    store::finish_run(ctx.conn, run_id, &summary.totals())?;
    Ok(summary)
}

fn flush_pending<R>(
    conn: &mut Connection,
    pending: &mut Vec<R>,
    flush: &mut impl FnMut(&mut Connection, &[R]) -> Result<WriteCounts>,
    summary: &mut RunSummary,
) {
    if pending.is_empty() {
        return;
    }
    match flush(conn, pending.as_slice()) {
        Ok(counts) => {
            info!(
                kind = summary.kind,
                inserted = counts.inserted,
                updated = counts.updated,
                ignored = counts.ignored,
                "batch stored"
            );
            summary.writes.absorb(counts);
        }
        Err(err) => {
            warn!(kind = summary.kind, rows = pending.len(), error = %format!("{err:#}"), "batch write failed");
            summary
                .errors
                .push(format!("batch of {} rows: {err:#}", pending.len()));
        }
    }
    pending.clear();
}

pub fn sync_fixture_stats(ctx: &mut SyncContext<'_>, limit: Option<usize>) -> Result<RunSummary> {
    let limit = limit.or(ctx.config.fixture_limit);
    let ids = store::pending_stats_fixture_ids(ctx.conn, limit)?;
    info!(fixtures = ids.len(), ?limit, "fixtures pending statistics");
    run_items(
        ctx,
        "fixture_stats",
        &ids,
        |fetcher, archive, id| {
            let doc = fetcher.fetch(
                &format!("fixtures/{id}"),
                &[("include", STATS_INCLUDE.to_string())],
            )?;
            archive.save("fixture_stats", &id.to_string(), &doc);
            Ok(normalize_fixture_stats_now(&doc))
        },
        |conn, rows| store::insert_stat_rows(conn, rows),
    )
}

pub fn sync_prematch_odds(ctx: &mut SyncContext<'_>, limit: Option<usize>) -> Result<RunSummary> {
    let limit = limit.or(ctx.config.fixture_limit);
    let ids = store::pending_odds_fixture_ids(ctx.conn, limit)?;
    info!(fixtures = ids.len(), ?limit, "fixtures pending odds");
    let filter = ctx.config.odds_filter.clone();
    run_items(
        ctx,
        "prematch_odds",
        &ids,
        |fetcher, archive, id| {
            let doc = fetcher.fetch(&format!("odds/pre-match/fixtures/{id}"), &[])?;
            archive.save("prematch_odds", &id.to_string(), &doc);
            let batch = normalize_prematch_odds(&doc, &filter);
            let c = batch.counts;
            info!(
                fixture_id = id,
                seen = c.seen,
                kept = c.kept,
                filtered_market = c.filtered_market,
                filtered_bookmaker = c.filtered_bookmaker,
                missing_fields = c.missing_fields,
                "odds normalized"
            );
            Ok(batch.rows)
        },
        |conn, rows| store::insert_odds_rows(conn, rows),
    )
}

/// Per-minute pressure for finished fixtures that have none stored yet.
pub fn sync_pressure(ctx: &mut SyncContext<'_>, limit: Option<usize>) -> Result<RunSummary> {
    let limit = limit.or(ctx.config.fixture_limit);
    let ids = store::pending_pressure_fixture_ids(ctx.conn, limit)?;
    info!(fixtures = ids.len(), ?limit, "fixtures pending pressure");
    run_items(
        ctx,
        "fixture_pressure",
        &ids,
        |fetcher, archive, id| {
            let doc = fetcher.fetch(
                &format!("fixtures/{id}"),
                &[("include", "pressure".to_string())],
            )?;
            archive.save("fixture_pressure", &id.to_string(), &doc);
            Ok(normalize_pressure_now(&doc))
        },
        |conn, rows| store::insert_pressure_rows(conn, rows),
    )
}

/// Explicit `seasons` win; otherwise every unfinished or current season in
/// the store.
pub fn sync_schedules(ctx: &mut SyncContext<'_>, seasons: &[u64]) -> Result<RunSummary> {
    let ids = if seasons.is_empty() {
        store::active_season_ids(ctx.conn)?
    } else {
        seasons.to_vec()
    };
    info!(seasons = ids.len(), "seasons to schedule");
    let policy = ctx.config.score_policy.clone();
    run_items(
        ctx,
        "schedules",
        &ids,
        |fetcher, archive, id| {
            let doc = fetcher.fetch(&format!("schedules/seasons/{id}"), &[])?;
            archive.save("schedules", &id.to_string(), &doc);
            Ok(normalize_schedule(&doc, &policy))
        },
        |conn, rows| store::upsert_fixtures(conn, rows),
    )
}

fn fetch_collection(
    ctx: &mut SyncContext<'_>,
    summary: &mut RunSummary,
    path: &str,
    params: &[(&str, String)],
) -> Result<Vec<Value>> {
    let paged = fetch_all_pages(
        ctx.fetcher,
        path,
        params,
        ctx.config.per_page,
        ctx.config.api_delay,
    )
    .with_context(|| format!("fetch {path}"))?;
    if let Some(err) = paged.error {
        summary.errors.push(err);
    }
    summary.targeted = paged.items.len();
    info!(path, pages = paged.pages, items = paged.items.len(), "collection fetched");
    ctx.archive
        .save(summary.kind, "all", &Value::Array(paged.items.clone()));
    Ok(paged.items)
}

/// Leagues with their nested seasons.
pub fn sync_leagues(ctx: &mut SyncContext<'_>) -> Result<RunSummary> {
    let mut summary = RunSummary::new("leagues");
    let run_id = store::begin_run(ctx.conn, summary.kind, 0)?;
    let items = fetch_collection(
        ctx,
        &mut summary,
        "leagues",
        &[("include", "seasons".to_string())],
    )?;

    let mut leagues = Vec::new();
    let mut seasons = Vec::new();
    for item in &items {
        match normalize_league(item) {
            Some((league, league_seasons)) => {
                summary.processed += 1;
                summary.rows_normalized += 1 + league_seasons.len();
                leagues.push(league);
                seasons.extend(league_seasons);
            }
            None => summary.skipped += 1,
        }
    }

    // an interrupt still stores what was already collected
    summary.interrupted = ctx.interrupt.is_set();
    summary.writes.absorb(store::upsert_leagues(ctx.conn, &leagues)?);
    summary.writes.absorb(store::upsert_seasons(ctx.conn, &seasons)?);
    store::finish_run(ctx.conn, run_id, &summary.totals())?;
    Ok(summary)
}

pub fn sync_teams(ctx: &mut SyncContext<'_>) -> Result<RunSummary> {
    let mut summary = RunSummary::new("teams");
    let run_id = store::begin_run(ctx.conn, summary.kind, 0)?;
    let items = fetch_collection(ctx, &mut summary, "teams", &[])?;

    let mut teams = Vec::new();
    for item in &items {
        match normalize_team(item) {
            Some(team) => {
                summary.processed += 1;
                summary.rows_normalized += 1;
                teams.push(team);
            }
            None => summary.skipped += 1,
        }
    }

    summary.interrupted = ctx.interrupt.is_set();
    for chunk in teams.chunks(ctx.config.batch_size.max(1)) {
        summary.writes.absorb(store::upsert_teams(ctx.conn, chunk)?);
    }
    store::finish_run(ctx.conn, run_id, &summary.totals())?;
    Ok(summary)
}
