//! ddc-history CLI
//!
//! Refreshes the archive cache and the upload history table.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ddc_history::{
    error::Result,
    models::{Config, PeriodRange},
    pipeline,
    services::Transport,
    storage::{self, OutputStore, RawStore},
};

/// ddc-history - debian-devel-changes upload history
#[derive(Parser, Debug)]
#[command(
    name = "ddc-history",
    version,
    about = "Mirror debian-devel-changes and extract upload history"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "ddc-history.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Raw Store database (overrides storage.cache_db)
    #[arg(long, global = true)]
    cache_db: Option<PathBuf>,

    /// Output Store database (overrides storage.output_db)
    #[arg(long, global = true)]
    output_db: Option<PathBuf>,

    /// Only process this year
    #[arg(long, global = true)]
    year: Option<i32>,

    /// Only process this month (requires --year)
    #[arg(long, global = true, requires = "year")]
    month: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh stale periods in the archive cache
    Crawl,

    /// Extract message bodies and upload records from the cache
    Extract,

    /// Run full pipeline: Crawl → Extract
    Run,

    /// Validate configuration
    Validate,

    /// Show row counts for both stores
    Info,
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load_optional(&cli.config);
    let level = match &loaded {
        Ok(Some(config)) => config.logging.level.clone(),
        _ => "info".to_string(),
    };
    init_logging(cli.verbose, &level);

    let mut config = match loaded {
        Ok(Some(config)) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Ok(None) => {
            log::warn!("No config at {}, using defaults", cli.config.display());
            Config::default()
        }
        Err(e) => {
            log::error!("Config load failed from {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };
    if let Some(path) = cli.cache_db {
        config.storage.cache_db = path;
    }
    if let Some(path) = cli.output_db {
        config.storage.output_db = path;
    }

    let range = PeriodRange::new(cli.year, cli.month)?;

    match cli.command {
        Command::Crawl => {
            config.validate()?;
            let transport = Transport::new(&config.crawler)?;
            let mut raw = RawStore::open(&config.storage.cache_db)?;

            let result = pipeline::run_crawler(&config, &transport, &mut raw, range).await;
            transport.close();
            let summary = result?;
            log::info!("Stored {} pages", summary.pages_stored);
        }

        Command::Extract => {
            config.validate()?;
            let mut raw = RawStore::open(&config.storage.cache_db)?;
            let mut output = OutputStore::open(&config.storage.output_db)?;
            let triage = storage::triage_sink(config.storage.triage_log.as_deref())?;

            pipeline::run_extraction(&config, &mut raw, &mut output, triage.as_ref(), range)?;
        }

        Command::Run => {
            config.validate()?;
            let transport = Transport::new(&config.crawler)?;
            let mut raw = RawStore::open(&config.storage.cache_db)?;
            let mut output = OutputStore::open(&config.storage.output_db)?;
            let triage = storage::triage_sink(config.storage.triage_log.as_deref())?;

            let result = pipeline::run_pipeline(
                &config,
                &transport,
                &mut raw,
                &mut output,
                triage.as_ref(),
                range,
            )
            .await;
            transport.close();
            let (crawl, extract) = result?;
            log::info!(
                "{} periods committed, {} uploads added",
                crawl.periods_committed,
                extract.uploads_stored
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({})", cli.config.display());
        }

        Command::Info => {
            if config.storage.cache_db.exists() {
                let stats = RawStore::open(&config.storage.cache_db)?.stats()?;
                log::info!(
                    "Raw Store {}: {} periods, {} pages, {} message bodies",
                    config.storage.cache_db.display(),
                    stats.periods,
                    stats.raw_pages,
                    stats.message_records
                );
            } else {
                log::info!("No Raw Store at {}", config.storage.cache_db.display());
            }

            if config.storage.output_db.exists() {
                let count = OutputStore::open(&config.storage.output_db)?.count()?;
                log::info!(
                    "Output Store {}: {} upload records",
                    config.storage.output_db.display(),
                    count
                );
            } else {
                log::info!("No Output Store at {}", config.storage.output_db.display());
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
