use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use showrec_adapters::{parse_timezone, DateSide, StandardRecordAdapter, StandardStringDateParser};
use showrec_core::ScrapedRecord;
use showrec_storage::{MemoryShowStore, PgShowStore, ShowCursor};
use showrec_sync::{
    build_candidate_filter, find_candidates, report_daily_markdown, Resolution, ResolveConfig,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "showrec-cli")]
#[command(about = "Streaming show reconciler command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    Start,
    End,
}

impl From<Side> for DateSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Start => DateSide::Start,
            Side::End => DateSide::End,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve every enabled source bundle into the canonical show state.
    Sync,
    /// Create the Postgres schema at DATABASE_URL.
    Migrate,
    /// Parse airing-date strings and print the resulting partial date.
    ParseDate {
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long, value_enum, default_value = "start")]
        side: Side,
        #[arg(long)]
        range: Option<String>,
        #[arg(long)]
        season: Option<String>,
        #[arg(long)]
        weekday: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    /// Look up the canonical shows a scraped record (JSON file) would resolve to.
    Match {
        record: PathBuf,
        #[arg(long)]
        restrict_id: Option<Uuid>,
    },
    Report {
        #[arg(long, default_value_t = 1)]
        runs: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "showrec-cli v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let summary = showrec_sync::run_resolve_once_from_env().await?;
            let counts = summary
                .action_counts
                .iter()
                .map(|(action, n)| format!("{action}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "sync complete: run_id={} sources={} records={} {} shows={} reports={}",
                summary.run_id,
                summary.enabled_sources,
                summary.records_seen,
                counts,
                summary.shows_total,
                summary.reports_dir
            );
        }
        Commands::Migrate => {
            let config = ResolveConfig::from_env()?;
            let url = config
                .database_url
                .context("DATABASE_URL must be set to migrate")?;
            let store = PgShowStore::connect(&url).await?;
            store.migrate().await?;
            println!("schema applied");
        }
        Commands::ParseDate {
            timezone,
            side,
            range,
            season,
            weekday,
            time,
        } => {
            let config = ResolveConfig::from_env()?;
            let parser = match timezone {
                Some(name) => StandardStringDateParser::new(parse_timezone(&name)?),
                None => StandardStringDateParser::from_config(&config.parser_config()),
            };
            let date = parser.parse_strings(
                side.into(),
                range.as_deref(),
                season.as_deref(),
                weekday.as_deref(),
                time.as_deref(),
            );
            println!("{}", serde_json::to_string(&date)?);
        }
        Commands::Match {
            record,
            restrict_id,
        } => {
            let config = ResolveConfig::from_env()?;
            let text = std::fs::read_to_string(&record)
                .with_context(|| format!("reading {}", record.display()))?;
            let scraped: ScrapedRecord = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", record.display()))?;
            let source_id = scraped
                .bindings
                .first()
                .map(|binding| binding.source_id.clone())
                .unwrap_or_default();
            let scraped = StandardRecordAdapter::new(source_id).normalize(&scraped);

            let resolution = match &config.database_url {
                Some(url) => {
                    let filter = build_candidate_filter(&scraped, restrict_id)?;
                    let shows = PgShowStore::connect(url).await?.find(&filter).await?;
                    Resolution::from_cursor(ShowCursor::new(shows.into_iter()))
                }
                None => {
                    let store = MemoryShowStore::load_snapshot(&config.state_path).await?;
                    let resolution =
                        Resolution::from_cursor(find_candidates(&store, &scraped, restrict_id)?);
                    resolution
                }
            };
            println!("{}", resolution.label());
            let shows = match &resolution {
                Resolution::NoMatch => Vec::new(),
                Resolution::Unique(show) => vec![show.as_ref()],
                Resolution::Ambiguous(shows) => shows.iter().collect(),
            };
            for show in shows {
                println!("  {} {:?}", show.id, show.name);
            }
        }
        Commands::Report { runs } => {
            let config = ResolveConfig::from_env()?;
            println!("{}", report_daily_markdown(runs, Some(config.workspace_root))?);
        }
    }

    Ok(())
}
