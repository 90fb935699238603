use std::path::Path;
use std::time::Duration;

use crate::ai::{BackfillEngine, BackfillReport, InferenceSupervisor};
use crate::config::{Config, InferenceConfig};
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::models::FeedSource;
use crate::store::{ArchiveCompactor, ArchiveSummary, IngestSummary, ItemStore};

/// Ingestion side of the pipeline: fetch, store, compact.
pub struct App {
    store: ItemStore,
    fetcher: FeedFetcher,
    compactor: ArchiveCompactor,
}

impl App {
    pub async fn new(config: &Config, db_path: &Path, raw_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(raw_root)?;
        let store = ItemStore::open(db_path, raw_root).await?;
        let fetcher = FeedFetcher::new(
            &config.user_agent,
            Duration::from_secs(config.fetch_timeout_secs),
        )?;
        let compactor = ArchiveCompactor::with_days(raw_root, config.archive_after_days);

        Ok(Self {
            store,
            fetcher,
            compactor,
        })
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Fetch one feed, ingest its entries, then compact its aged raw files.
    pub async fn refresh_feed(&self, feed: &FeedSource) -> Result<(IngestSummary, ArchiveSummary)> {
        let entries = self.fetcher.fetch_feed(&feed.url).await?;
        let ingested = self.store.ingest_entries(&feed.name, &entries).await;
        tracing::info!(
            source = %feed.name,
            inserted = ingested.inserted,
            already_present = ingested.already_present,
            skipped = ingested.skipped,
            failed = ingested.failed,
            "Ingested feed"
        );
        let archived = self.compactor.compact(&feed.name)?;
        Ok((ingested, archived))
    }

    /// Refresh feeds one after another. A failing feed is logged and the next one proceeds.
    ///
    /// Returns the number of feeds that failed.
    pub async fn refresh_all(&self, feeds: &[FeedSource]) -> usize {
        let mut failed = 0;
        for feed in feeds {
            if let Err(e) = self.refresh_feed(feed).await {
                failed += 1;
                tracing::error!("Error downloading feed {}@{}: {}", feed.name, feed.url, e);
            }
        }
        failed
    }
}

/// Run one backfill pass with the inference service held up for its duration.
///
/// The service is torn down afterwards only if this run started it.
pub async fn run_backfill(store: &ItemStore, inference: &InferenceConfig) -> Result<BackfillReport> {
    let mut supervisor = InferenceSupervisor::from_config(inference)?;
    supervisor.ensure_running().await?;

    let result = BackfillEngine::new(store, supervisor.client()).run().await;

    if let Err(e) = supervisor.teardown().await {
        tracing::warn!("Failed to stop inference service: {}", e);
    }
    result
}

/// Run a single prompt through the inference service.
pub async fn run_inference(inference: &InferenceConfig, prompt: &str) -> Result<String> {
    let mut supervisor = InferenceSupervisor::from_config(inference)?;
    supervisor.ensure_running().await?;

    let result = supervisor.client().generate(prompt).await;

    if let Err(e) = supervisor.teardown().await {
        tracing::warn!("Failed to stop inference service: {}", e);
    }
    result
}
