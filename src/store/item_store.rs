use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{FeedEntry, IngestOutcome, ItemKey};

use super::filename::derive_filename;

pub(crate) const XML_DECLARATION: &str = "<?xml version='1.0' encoding='utf-8'?>\n";

/// Tally of one feed's ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Owner of the feed-item index and the per-source raw file tree.
pub struct ItemStore {
    repository: Repository,
    raw_root: PathBuf,
}

impl ItemStore {
    pub async fn open(db_path: impl AsRef<Path>, raw_root: impl Into<PathBuf>) -> Result<Self> {
        let repository = Repository::open(db_path).await?;
        Ok(Self {
            repository,
            raw_root: raw_root.into(),
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn raw_root(&self) -> &Path {
        &self.raw_root
    }

    pub fn source_dir(&self, source: &str) -> PathBuf {
        self.raw_root.join(source)
    }

    pub fn raw_path(&self, key: &ItemKey) -> Result<PathBuf> {
        let filename = derive_filename(&key.title, &key.pub_date)?;
        Ok(self.source_dir(&key.source).join(filename))
    }

    /// Index one entry and write its raw file.
    ///
    /// The index row is written before the file. A key that is already indexed
    /// leaves the existing file alone.
    pub async fn ingest(&self, source: &str, entry: &FeedEntry) -> Result<IngestOutcome> {
        let Some((title, pub_date, link)) = entry.identity() else {
            return Ok(IngestOutcome::Skipped);
        };

        // Naming first: an entry that cannot be named must not leave an index row behind.
        let filename = derive_filename(title, pub_date)?;

        let key = ItemKey::new(source, pub_date, title);
        if !self.repository.insert_item(key, link.to_string()).await? {
            return Ok(IngestOutcome::AlreadyPresent);
        }

        let dir = self.source_dir(source);
        std::fs::create_dir_all(&dir)?;
        let mut content = String::with_capacity(XML_DECLARATION.len() + entry.raw_xml.len());
        content.push_str(XML_DECLARATION);
        content.push_str(&entry.raw_xml);
        std::fs::write(dir.join(filename), content)?;

        Ok(IngestOutcome::Inserted)
    }

    /// Ingest entries in order, isolating failures per entry.
    pub async fn ingest_entries(&self, source: &str, entries: &[FeedEntry]) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for entry in entries {
            match self.ingest(source, entry).await {
                Ok(IngestOutcome::Inserted) => summary.inserted += 1,
                Ok(IngestOutcome::AlreadyPresent) => summary.already_present += 1,
                Ok(IngestOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        source,
                        title = entry.title.as_deref().unwrap_or_default(),
                        pub_date = entry.pub_date.as_deref().unwrap_or_default(),
                        "Failed to ingest item: {}",
                        e
                    );
                }
            }
        }
        summary
    }

    pub async fn list_unscored(&self) -> Result<Vec<ItemKey>> {
        self.repository.list_unscored().await
    }

    pub fn load_raw(&self, key: &ItemKey) -> Result<String> {
        let path = self.raw_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::RawItemMissing(path)),
            Err(e) => Err(e.into()),
        }
    }
}
