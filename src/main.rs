use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use halfline::archive::RawArchive;
use halfline::completeness::completeness_report;
use halfline::config::PipelineConfig;
use halfline::features::build_dataset;
use halfline::http_client::ApiClient;
use halfline::shutdown::InterruptFlag;
use halfline::sync::{self, RunSummary, SyncContext};
use halfline::{export, logging, store};

#[derive(Parser)]
#[command(name = "halfline")]
#[command(about = "Football statistics ETL and second-half handicap dataset builder", long_about = None)]
struct Cli {
    /// SQLite database path (overrides HALFLINE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch leagues with their seasons
    SyncLeagues,
    /// Fetch teams
    SyncTeams,
    /// Fetch season schedules into the fixtures table
    SyncSchedules {
        /// Season ids to fetch; defaults to unfinished or current seasons
        #[arg(long = "season")]
        seasons: Vec<u64>,
    },
    /// Fetch per-period statistics for finished fixtures
    SyncStats {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Fetch pre-match odds for finished fixtures
    SyncOdds {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Fetch per-minute pressure readings for finished fixtures
    SyncPressure {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Report fixtures with incomplete first-half statistics
    Check {
        /// Maximum number of incomplete fixture ids to print
        #[arg(long, default_value = "100")]
        show: usize,
    },
    /// Build the feature table and write it as CSV
    BuildDataset {
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write an XLSX workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = PipelineConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let mut conn = store::open_db(&config.db_path)?;

    match cli.command {
        Commands::Check { show } => {
            let report = completeness_report(&conn, &config.features.required_stats)?;
            println!("Completeness check");
            println!("DB: {}", config.db_path.display());
            println!("Fixtures with first-half rows: {}", report.checked);
            println!("Incomplete: {}", report.incomplete.len());
            for id in report.incomplete.iter().take(show) {
                println!("  - {id}");
            }
            if report.incomplete.len() > show {
                println!("  ... {} more", report.incomplete.len() - show);
            }
            return Ok(());
        }
        Commands::BuildDataset { out, xlsx } => {
            let (rows, report) = build_dataset(&conn, &config.features)?;
            let out = out.unwrap_or_else(|| {
                config
                    .processed_dir()
                    .join(format!("ml_dataset_{}.csv", config.features.target_column()))
            });
            export::write_csv(&out, &config.features, &rows)?;
            if let Some(path) = xlsx.as_deref() {
                export::write_xlsx(path, &config.features, &rows, &report)?;
            }
            println!("Dataset build complete");
            println!("Output: {}", out.display());
            println!("Target: {}", config.features.target_column());
            println!("Candidates: {}", report.candidates);
            println!("Excluded (incomplete): {}", report.excluded_incomplete);
            for (reason, count) in &report.exclusions {
                println!("Excluded ({reason}): {count}");
            }
            println!("Rows written: {}", report.rows);
            return Ok(());
        }
        _ => {}
    }

    let client = ApiClient::from_config(&config).context("api client setup")?;
    let archive = RawArchive::new(config.raw_dir(), config.archive_raw);
    let interrupt = InterruptFlag::new();
    interrupt.install_ctrl_c()?;
    let mut ctx = SyncContext {
        conn: &mut conn,
        fetcher: &client,
        config: &config,
        archive: &archive,
        interrupt: &interrupt,
    };

    let summary = match cli.command {
        Commands::SyncLeagues => sync::sync_leagues(&mut ctx)?,
        Commands::SyncTeams => sync::sync_teams(&mut ctx)?,
        Commands::SyncSchedules { seasons } => sync::sync_schedules(&mut ctx, &seasons)?,
        Commands::SyncStats { limit } => sync::sync_fixture_stats(&mut ctx, limit)?,
        Commands::SyncOdds { limit } => sync::sync_prematch_odds(&mut ctx, limit)?,
        Commands::SyncPressure { limit } => sync::sync_pressure(&mut ctx, limit)?,
        Commands::Check { .. } | Commands::BuildDataset { .. } => return Ok(()),
    };
    print_summary(&config, &summary);
    Ok(())
}

fn print_summary(config: &PipelineConfig, summary: &RunSummary) {
    println!("Sync complete: {}", summary.kind);
    println!("DB: {}", config.db_path.display());
    println!("Processed: {}/{}", summary.processed, summary.targeted);
    if summary.empty > 0 {
        println!("Without rows: {}", summary.empty);
    }
    if summary.skipped > 0 {
        println!("Skipped records: {}", summary.skipped);
    }
    println!("Rows normalized: {}", summary.rows_normalized);
    println!(
        "Rows written: {} (inserted={} updated={} ignored={})",
        summary.writes.written(),
        summary.writes.inserted,
        summary.writes.updated,
        summary.writes.ignored
    );
    if summary.interrupted {
        println!("Interrupted before finishing");
    }
    if !summary.failed.is_empty() {
        println!("  failures: {}", summary.failed.len());
        for (id, err) in summary.failed.iter().take(6) {
            println!("   - {id}: {err}");
        }
    }
    if !summary.errors.is_empty() {
        println!("  errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!("   - {err}");
        }
    }
}
