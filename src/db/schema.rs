pub const SCHEMA: &str = r#"
-- feed-item index: one row per ingested entry, never deleted
CREATE TABLE IF NOT EXISTS rss_items (
    source TEXT NOT NULL,
    pubDate TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    PRIMARY KEY (source, pubDate, title)
);

-- sentiment index: at most one row per rss_items row
CREATE TABLE IF NOT EXISTS sentiment (
    source TEXT NOT NULL,
    pubDate TEXT NOT NULL,
    title TEXT NOT NULL,
    sentiment INTEGER NOT NULL CHECK (sentiment IN (-1, 0, 1)),
    explanation TEXT NOT NULL CHECK (length(explanation) > 0),
    PRIMARY KEY (source, pubDate, title)
);
"#;
