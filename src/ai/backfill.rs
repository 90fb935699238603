use crate::error::{AppError, Result};
use crate::models::{ItemKey, SentimentRecord};
use crate::services::extract_item;
use crate::store::ItemStore;

use super::sentiment::{build_prompt, parse_sentiment};

/// Anything that turns a prompt into a free-form model answer.
#[allow(async_fn_in_trait)]
pub trait Scorer {
    async fn score(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub scored: usize,
    pub failed: Vec<(ItemKey, String)>,
}

impl BackfillReport {
    fn skip(&mut self, key: ItemKey, error: AppError) {
        tracing::warn!("Skipping {}: {}", key, error);
        self.failed.push((key, error.to_string()));
    }
}

/// Scores every indexed item that has no sentiment row yet.
pub struct BackfillEngine<'a, S> {
    store: &'a ItemStore,
    scorer: &'a S,
}

impl<'a, S: Scorer> BackfillEngine<'a, S> {
    pub fn new(store: &'a ItemStore, scorer: &'a S) -> Self {
        Self { store, scorer }
    }

    /// One sequential pass over the unscored items.
    ///
    /// Each record is committed as soon as it is scored. A failing item is
    /// logged and recorded in the report; the pass carries on.
    pub async fn run(&self) -> Result<BackfillReport> {
        let keys = self.store.list_unscored().await?;
        tracing::info!("{} unscored items", keys.len());

        let mut report = BackfillReport::default();
        for key in keys {
            let record = match self.score_item(&key).await {
                Ok(record) => record,
                Err(e) => {
                    report.skip(key, e);
                    continue;
                }
            };

            let sentiment = record.sentiment;
            match self.store.repository().insert_sentiment(record).await {
                Ok(true) => {
                    report.scored += 1;
                    tracing::info!("Processed: {} → sentiment={}", key, sentiment);
                }
                Ok(false) => tracing::warn!("Sentiment already recorded for {}", key),
                Err(e) => report.skip(key, e),
            }
        }

        tracing::info!(
            scored = report.scored,
            failed = report.failed.len(),
            "Backfill pass finished"
        );
        Ok(report)
    }

    async fn score_item(&self, key: &ItemKey) -> Result<SentimentRecord> {
        let raw = self.store.load_raw(key)?;
        let item = extract_item(&raw)?;
        let response = self.scorer.score(&build_prompt(&item.title, &item.text)).await?;
        let (sentiment, explanation) = parse_sentiment(&response)?;

        Ok(SentimentRecord {
            key: key.clone(),
            sentiment,
            explanation,
        })
    }
}
