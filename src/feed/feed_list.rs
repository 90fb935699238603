use std::path::Path;

use opml::{Outline, OPML};
use serde::Deserialize;

use crate::error::Result;
use crate::models::FeedSource;

#[derive(Debug, Deserialize)]
struct FeedListFile {
    #[serde(default)]
    feeds: Vec<FeedSource>,
}

/// Load a feed list, picking the format from the extension.
///
/// `.yaml`/`.yml` is a bare list of `{name, url}` mappings, `.opml` an
/// outline export, anything else TOML with `[[feeds]]` tables.
pub fn load_feed_list(path: &Path) -> Result<Vec<FeedSource>> {
    let content = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("yaml" | "yml") => parse_yaml_feeds(&content),
        Some("opml") => parse_opml_feeds(&content),
        _ => parse_toml_feeds(&content),
    }
}

pub fn parse_yaml_feeds(content: &str) -> Result<Vec<FeedSource>> {
    Ok(serde_yaml::from_str(content)?)
}

pub fn parse_toml_feeds(content: &str) -> Result<Vec<FeedSource>> {
    let file: FeedListFile = toml::from_str(content)?;
    Ok(file.feeds)
}

pub fn parse_opml_feeds(content: &str) -> Result<Vec<FeedSource>> {
    let opml = OPML::from_str(content)?;
    let mut feeds = Vec::new();
    collect_outlines(&opml.body.outlines, &mut feeds);
    Ok(feeds)
}

fn collect_outlines(outlines: &[Outline], feeds: &mut Vec<FeedSource>) {
    for outline in outlines {
        if let Some(url) = &outline.xml_url {
            let name = if outline.text.is_empty() {
                outline.title.clone().unwrap_or_else(|| url.clone())
            } else {
                outline.text.clone()
            };
            feeds.push(FeedSource {
                name,
                url: url.clone(),
            });
        }
        collect_outlines(&outline.outlines, feeds);
    }
}
