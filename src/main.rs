use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use feed_archivist::app::{run_backfill, run_inference, App};
use feed_archivist::config::Config;
use feed_archivist::db::Repository;
use feed_archivist::feed::load_feed_list;
use feed_archivist::models::FeedSource;
use feed_archivist::store::{derive_filename, ArchiveCompactor, ItemStore};

/// Archive RSS feeds item by item and backfill sentiment with a local model.
#[derive(Parser)]
#[command(name = "feed-archivist", version)]
struct Cli {
    /// Config file (TOML). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, ingest and compact every feed in a feed list (YAML, TOML or OPML).
    Ingest {
        feeds: PathBuf,
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Fetch, ingest and compact a single feed.
    Fetch {
        source_name: String,
        source_uri: String,
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Fold aged raw files of one source into monthly archives.
    Compact {
        source_name: String,
        /// Raw storage root (overrides config).
        #[arg(long)]
        raw: Option<PathBuf>,
    },

    /// Score every indexed item that has no sentiment yet.
    Backfill {
        raw_storage_path: PathBuf,
        db_path: PathBuf,
    },

    /// Run one prompt through the inference service.
    Infer { prompt: Vec<String> },

    /// Print the raw file name for a title and publication timestamp.
    Filename { title: String, pub_date: String },

    /// Per-source item and scored counts.
    Status {
        /// Index database (overrides config).
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct StorageArgs {
    /// Index database (overrides config).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Raw storage root (overrides config).
    #[arg(long)]
    raw: Option<PathBuf>,
}

impl StorageArgs {
    fn resolve(&self, config: &Config) -> (PathBuf, PathBuf) {
        (
            self.db.clone().unwrap_or_else(|| PathBuf::from(&config.db_path)),
            self.raw
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.raw_storage_path)),
        )
    }
}

const DEFAULT_PROMPT: &str = "Explain why the sky is blue in one paragraph.";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("loading config")
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config: config_path,
        command,
    } = cli;
    let config_path = config_path.as_deref();

    match command {
        Commands::Filename { title, pub_date } => {
            println!("{}", derive_filename(&title, &pub_date)?);
        }

        Commands::Ingest { feeds, storage } => {
            let config = load_config(config_path)?;
            let feeds = load_feed_list(&feeds)
                .with_context(|| format!("reading feed list {}", feeds.display()))?;
            let (db_path, raw_root) = storage.resolve(&config);
            let app = App::new(&config, &db_path, &raw_root).await?;
            let failed = app.refresh_all(&feeds).await;
            println!("Refreshed {} feeds ({} failed)", feeds.len() - failed, failed);
        }

        Commands::Fetch {
            source_name,
            source_uri,
            storage,
        } => {
            let config = load_config(config_path)?;
            let (db_path, raw_root) = storage.resolve(&config);
            let app = App::new(&config, &db_path, &raw_root).await?;
            let feed = FeedSource {
                name: source_name,
                url: source_uri,
            };
            if app.refresh_all(std::slice::from_ref(&feed)).await == 0 {
                println!("Refreshed {}", feed.name);
            }
        }

        Commands::Compact { source_name, raw } => {
            let config = load_config(config_path)?;
            let raw_root = raw.unwrap_or_else(|| PathBuf::from(&config.raw_storage_path));
            let compactor = ArchiveCompactor::with_days(raw_root, config.archive_after_days);
            let summary = compactor.compact(&source_name)?;
            println!(
                "Archived {} files into {} bundles",
                summary.archived_files,
                summary.bundles.len()
            );
        }

        Commands::Backfill {
            raw_storage_path,
            db_path,
        } => {
            for path in [&raw_storage_path, &db_path] {
                if !path.exists() {
                    bail!("{} does not exist", path.display());
                }
            }
            let config = load_config(config_path)?;
            let store = ItemStore::open(&db_path, &raw_storage_path).await?;
            let report = run_backfill(&store, &config.inference).await?;
            println!(
                "Scored {} items ({} failed)",
                report.scored,
                report.failed.len()
            );
        }

        Commands::Infer { prompt } => {
            let config = load_config(config_path)?;
            let prompt = if prompt.is_empty() {
                DEFAULT_PROMPT.to_string()
            } else {
                prompt.join(" ")
            };
            let response = run_inference(&config.inference, &prompt).await?;
            println!("Model response:\n{}", response);
        }

        Commands::Status { db } => {
            let config = load_config(config_path)?;
            let db_path = db.unwrap_or_else(|| PathBuf::from(&config.db_path));
            let repository = Repository::open(&db_path).await?;
            for stats in repository.source_stats().await? {
                println!(
                    "{:<24} {:>8} items {:>8} scored {:>8} unscored",
                    stats.source,
                    stats.items,
                    stats.scored,
                    stats.items - stats.scored
                );
            }
        }
    }

    Ok(())
}
