use std::fmt;

/// A parsed feed entry as it came off the wire.
///
/// The three identity fields are optional because feeds routinely omit them;
/// entries lacking any of them are skipped at ingest time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub pub_date: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    /// The item element exactly as it appeared in the document.
    pub raw_xml: String,
}

impl FeedEntry {
    /// Title, publication timestamp and link, if all three are present and non-empty.
    pub fn identity(&self) -> Option<(&str, &str, &str)> {
        Some((
            non_empty(&self.title)?,
            non_empty(&self.pub_date)?,
            non_empty(&self.link)?,
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Composite key shared by the feed-item and sentiment tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub source: String,
    pub pub_date: String,
    pub title: String,
}

impl ItemKey {
    pub fn new(
        source: impl Into<String>,
        pub_date: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            pub_date: pub_date.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source='{}', pubDate='{}', title='{}'",
            self.source, self.pub_date, self.title
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    AlreadyPresent,
    /// Entry lacked a title, publication timestamp or link.
    Skipped,
}
