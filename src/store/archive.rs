use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::error::Result;

use super::filename::MONTH_PREFIX_LEN;
use super::item_store::XML_DECLARATION;

const ARCHIVES_DIR: &str = "archives";
const BUNDLE_ROOT: &str = "rss_archive";

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub bundles: Vec<PathBuf>,
    pub archived_files: usize,
}

/// Folds aged raw files into one bundle per source and month.
pub struct ArchiveCompactor {
    raw_root: PathBuf,
    max_age: Duration,
}

impl ArchiveCompactor {
    pub fn new(raw_root: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            raw_root: raw_root.into(),
            max_age,
        }
    }

    pub fn with_days(raw_root: impl Into<PathBuf>, days: u64) -> Self {
        Self::new(raw_root, Duration::from_secs(days * SECS_PER_DAY))
    }

    pub fn archive_dir(&self, source: &str) -> PathBuf {
        self.raw_root.join(ARCHIVES_DIR).join(source)
    }

    pub fn bundle_path(&self, source: &str, month: &str) -> PathBuf {
        self.archive_dir(source).join(format!("archive_{month}.xml"))
    }

    /// Bundle every raw file of `source` last modified before the cutoff,
    /// then delete the bundled originals.
    ///
    /// An existing bundle for the same month is overwritten, not merged.
    pub fn compact(&self, source: &str) -> Result<ArchiveSummary> {
        let source_dir = self.raw_root.join(source);
        if !source_dir.is_dir() {
            return Ok(ArchiveSummary::default());
        }

        let cutoff = SystemTime::now()
            .checked_sub(self.max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut files_by_month: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for entry in std::fs::read_dir(&source_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.ends_with(".xml") || !name.contains('_') {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() || metadata.modified()? > cutoff {
                continue;
            }
            let Some(month) = name.get(..MONTH_PREFIX_LEN) else {
                continue;
            };
            files_by_month
                .entry(month.to_string())
                .or_default()
                .push(entry.path());
        }

        let mut summary = ArchiveSummary::default();
        if files_by_month.is_empty() {
            return Ok(summary);
        }

        std::fs::create_dir_all(self.archive_dir(source))?;
        for (month, files) in files_by_month {
            let bundle_path = self.bundle_path(source, &month);
            std::fs::write(&bundle_path, build_bundle(&files)?)?;

            for file in &files {
                std::fs::remove_file(file)?;
            }
            tracing::info!(
                source,
                month = %month,
                files = files.len(),
                "Archived to {}",
                bundle_path.display()
            );
            summary.archived_files += files.len();
            summary.bundles.push(bundle_path);
        }

        Ok(summary)
    }
}

fn build_bundle(files: &[PathBuf]) -> Result<String> {
    let mut bundle = String::from(XML_DECLARATION);
    bundle.push_str(&format!("<{BUNDLE_ROOT}>"));
    for file in files {
        let content = std::fs::read_to_string(file)?;
        bundle.push('\n');
        bundle.push_str(strip_declaration(&content).trim());
    }
    bundle.push_str(&format!("\n</{BUNDLE_ROOT}>\n"));
    Ok(bundle)
}

fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    trimmed
}
