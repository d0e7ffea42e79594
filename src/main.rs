use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod cache;
mod db;
mod error;
mod feed;
mod merit;
mod models;
mod report;
mod sources;
mod store;
#[cfg(test)]
mod testutil;

use cache::EventListCache;
use feed::SimulatedEventFeed;
use models::{EventCategory, EventFilter, EventStatus, SortKey};
use store::FileSessionStore;

#[derive(Parser)]
#[command(name = "merit-tracker")]
#[command(about = "University merit points tracker", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Minutes a fetched event list stays fresh
    #[arg(long, global = true, default_value_t = cache::DEFAULT_TTL.as_secs() / 60)]
    cache_ttl_minutes: u64,

    /// Session file holding the event cache between runs
    /// (default: merit-tracker-session.json in the temp directory)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    /// Probability that a simulated catalog fetch fails
    #[arg(long, global = true, default_value_t = feed::DEFAULT_FAILURE_RATE)]
    fetch_failure_rate: f64,

    /// Simulated catalog latency in milliseconds
    #[arg(long, global = true, default_value_t = 250)]
    fetch_latency_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Apply merit awards from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show one student's merit summary
    Summary {
        #[arg(long)]
        student: String,
    },
    /// Rank all students by merit points
    Leaderboard {
        /// total, university, faculty, college or association
        #[arg(long, default_value = "total")]
        sort: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Browse the event catalog through the session cache
    Events {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        force_refresh: bool,
        /// Only show the cached list; never contact the catalog
        #[arg(long, conflicts_with = "force_refresh")]
        offline: bool,
    },
    /// Drop the cached event list
    ClearCache,
    /// End the session and delete its file
    EndSession,
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "total")]
        sort: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn open_session(path: Option<PathBuf>) -> anyhow::Result<FileSessionStore> {
    let path =
        path.unwrap_or_else(|| std::env::temp_dir().join("merit-tracker-session.json"));
    FileSessionStore::open(&path)
        .with_context(|| format!("failed to open session file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ttl = Duration::from_secs(cli.cache_ttl_minutes * 60);

    match cli.command {
        Commands::ClearCache => {
            let cache = EventListCache::with_ttl(
                open_session(cli.session_file)?,
                SimulatedEventFeed::new(Vec::new()),
                ttl,
            );
            cache.clear_cache();
            println!("Event cache cleared ({}).", cache.store().path().display());
            return Ok(());
        }
        Commands::EndSession => {
            open_session(cli.session_file)?.end_session()?;
            println!("Session ended.");
            return Ok(());
        }
        _ => {}
    }

    let pool = connect().await?;

    match cli.command {
        Commands::ClearCache | Commands::EndSession => {}
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let outcome = db::import_awards(&pool, &csv).await?;
            println!(
                "Awarded {} rows from {} ({} skipped).",
                outcome.awarded,
                csv.display(),
                outcome.skipped
            );
        }
        Commands::Summary { student } => {
            let data = db::load_merit_data(&pool).await?;
            let Some(found) = data.student_by_number(&student) else {
                println!("No student with number {student}.");
                return Ok(());
            };
            let summary = merit::summarize_for_student(&data, found.id);

            println!("{} ({}, {})", found.full_name, found.student_number, found.faculty);
            println!(
                "- total {} / {} points ({}%)",
                summary.total_points, summary.target_points, summary.progress_percentage
            );
            println!(
                "- university {}, faculty {}, college {}, association {}",
                summary.university_merit,
                summary.faculty_merit,
                summary.college_merit,
                summary.association_merit
            );
            println!(
                "- {} activities in the last {} days",
                summary.recent_activities,
                merit::RECENT_WINDOW_DAYS
            );
            match summary.rank {
                Some(rank) => println!("- rank {rank} of {}", summary.total_students),
                None => println!("- unranked ({} students)", summary.total_students),
            }
        }
        Commands::Leaderboard { sort, limit } => {
            let data = db::load_merit_data(&pool).await?;
            let sort_key = SortKey::from(sort.as_str());
            let board = merit::leaderboard(&data, sort_key);

            if board.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            println!("Top students by {} merit:", sort_key.as_str());
            for (index, entry) in board.iter().take(limit).enumerate() {
                println!(
                    "{}. {} ({}, {}) total {} [U {} / F {} / C {} / A {}]",
                    index + 1,
                    entry.full_name,
                    entry.student_number,
                    entry.faculty,
                    entry.total_points,
                    entry.university_merit,
                    entry.faculty_merit,
                    entry.college_merit,
                    entry.association_merit
                );
            }
        }
        Commands::Events {
            category,
            status,
            search,
            force_refresh,
            offline,
        } => {
            let status = match status.as_deref() {
                Some(label) => Some(
                    EventStatus::parse(label)
                        .with_context(|| format!("unknown event status {label:?}"))?,
                ),
                None => None,
            };
            let filter = EventFilter {
                category: category.as_deref().map(EventCategory::parse),
                status,
                search,
            };

            let catalog = if offline {
                Vec::new()
            } else {
                db::fetch_events(&pool).await?
            };
            let feed = SimulatedEventFeed::new(catalog)
                .with_latency(Duration::from_millis(cli.fetch_latency_ms))
                .with_failure_rate(cli.fetch_failure_rate);
            let cache = EventListCache::with_ttl(open_session(cli.session_file)?, feed, ttl);

            let events = if offline {
                match cache.cached_events() {
                    Some(events) => events,
                    None => {
                        println!("No fresh cached events; run without --offline.");
                        return Ok(());
                    }
                }
            } else {
                cache.fetch_event_list(force_refresh).await?
            };
            let matched = cache::filter_events(&events, &filter);

            if matched.is_empty() {
                println!("No events match.");
            }
            for event in &matched {
                let seats = if event.is_full() {
                    "full".to_string()
                } else {
                    format!("{} seats left", event.seats_left())
                };
                println!(
                    "- {} [{} | {}] {} pts on {} by {}, {}",
                    event.title,
                    event.category,
                    event.status.as_str(),
                    event.points,
                    event.date,
                    event.organizer,
                    seats
                );
            }

            let status = cache.cache_status();
            log::info!(
                "event cache {}: valid={} age={}ms remaining={}ms",
                cache.store().path().display(),
                status.is_valid,
                status.age_ms,
                status.remaining_ms
            );
        }
        Commands::Report { sort, limit, out } => {
            let data = db::load_merit_data(&pool).await?;
            let report = report::build_report(
                &data,
                SortKey::from(sort.as_str()),
                limit,
                Utc::now().date_naive(),
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
