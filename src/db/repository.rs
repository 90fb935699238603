use std::path::Path;

use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{ItemKey, Sentiment, SentimentRecord};

use super::schema::SCHEMA;

/// Item and scored counts for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStats {
    pub source: String,
    pub items: i64,
    pub scored: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed-item index

    /// Insert a feed-item row. Returns `false` when the key was already indexed.
    pub async fn insert_item(&self, key: ItemKey, link: String) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO rss_items (source, pubDate, title, link) VALUES (?1, ?2, ?3, ?4)",
                    params![key.source, key.pub_date, key.title, link],
                )?;
                Ok(changed == 1)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_item_link(&self, key: ItemKey) -> Result<Option<String>> {
        let link = self
            .conn
            .call(move |conn| {
                let link = conn
                    .query_row(
                        "SELECT link FROM rss_items WHERE source = ?1 AND pubDate = ?2 AND title = ?3",
                        params![key.source, key.pub_date, key.title],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(link)
            })
            .await?;
        Ok(link)
    }

    /// Feed-item rows with no sentiment row for the same key.
    pub async fn list_unscored(&self) -> Result<Vec<ItemKey>> {
        let keys = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT r.source, r.pubDate, r.title
                       FROM rss_items r
                       LEFT JOIN sentiment s
                         ON r.source = s.source AND r.pubDate = s.pubDate AND r.title = s.title
                       WHERE s.source IS NULL"#,
                )?;
                let keys = stmt
                    .query_map([], key_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await?;
        Ok(keys)
    }

    // Sentiment index

    /// Insert a sentiment row in its own statement. Returns `false` if one already existed.
    pub async fn insert_sentiment(&self, record: SentimentRecord) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT OR IGNORE INTO sentiment (source, pubDate, title, sentiment, explanation)
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![
                        record.key.source,
                        record.key.pub_date,
                        record.key.title,
                        record.sentiment.value(),
                        record.explanation,
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_sentiment(&self, key: ItemKey) -> Result<Option<SentimentRecord>> {
        let record = self
            .conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        r#"SELECT source, pubDate, title, sentiment, explanation
                           FROM sentiment WHERE source = ?1 AND pubDate = ?2 AND title = ?3"#,
                        params![key.source, key.pub_date, key.title],
                        sentiment_from_row,
                    )
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    pub async fn source_stats(&self) -> Result<Vec<SourceStats>> {
        let stats = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT r.source, COUNT(*), COUNT(s.source)
                       FROM rss_items r
                       LEFT JOIN sentiment s
                         ON r.source = s.source AND r.pubDate = s.pubDate AND r.title = s.title
                       GROUP BY r.source
                       ORDER BY r.source"#,
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(SourceStats {
                            source: row.get(0)?,
                            items: row.get(1)?,
                            scored: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }
}

fn key_from_row(row: &Row) -> rusqlite::Result<ItemKey> {
    Ok(ItemKey {
        source: row.get(0)?,
        pub_date: row.get(1)?,
        title: row.get(2)?,
    })
}

fn sentiment_from_row(row: &Row) -> rusqlite::Result<SentimentRecord> {
    let value: i64 = row.get(3)?;
    let sentiment = Sentiment::from_value(value)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, value))?;
    Ok(SentimentRecord {
        key: key_from_row(row)?,
        sentiment,
        explanation: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(title: &str) -> ItemKey {
        ItemKey::new("wire", "Sun, 15 Jun 2025 16:52:25 +0000", title)
    }

    async fn open_temp() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();
        (dir, repo)
    }

    #[tokio::test]
    async fn duplicate_item_is_not_an_error() {
        let (_dir, repo) = open_temp().await;
        assert!(repo.insert_item(key("a"), "https://x/a".into()).await.unwrap());
        assert!(!repo.insert_item(key("a"), "https://x/other".into()).await.unwrap());
        assert_eq!(
            repo.get_item_link(key("a")).await.unwrap().as_deref(),
            Some("https://x/a")
        );
    }

    #[tokio::test]
    async fn anti_join_returns_only_unscored_keys() {
        let (_dir, repo) = open_temp().await;
        for title in ["a", "b", "c"] {
            repo.insert_item(key(title), format!("https://x/{title}"))
                .await
                .unwrap();
        }
        repo.insert_sentiment(SentimentRecord {
            key: key("b"),
            sentiment: Sentiment::Negative,
            explanation: "grim".into(),
        })
        .await
        .unwrap();

        let mut unscored = repo.list_unscored().await.unwrap();
        unscored.sort();
        assert_eq!(unscored, vec![key("a"), key("c")]);
    }

    #[tokio::test]
    async fn sentiment_is_written_once() {
        let (_dir, repo) = open_temp().await;
        repo.insert_item(key("a"), "https://x/a".into()).await.unwrap();
        let record = SentimentRecord {
            key: key("a"),
            sentiment: Sentiment::Positive,
            explanation: "upbeat".into(),
        };
        assert!(repo.insert_sentiment(record.clone()).await.unwrap());
        assert!(!repo
            .insert_sentiment(SentimentRecord {
                sentiment: Sentiment::Negative,
                ..record.clone()
            })
            .await
            .unwrap());
        assert_eq!(repo.get_sentiment(key("a")).await.unwrap(), Some(record));

        let stats = repo.source_stats().await.unwrap();
        assert_eq!(
            stats,
            vec![SourceStats {
                source: "wire".into(),
                items: 1,
                scored: 1
            }]
        );
    }

    #[tokio::test]
    async fn empty_explanation_violates_constraint() {
        let (_dir, repo) = open_temp().await;
        let result = repo
            .insert_sentiment(SentimentRecord {
                key: key("a"),
                sentiment: Sentiment::Neutral,
                explanation: String::new(),
            })
            .await;
        tokio_test::assert_err!(result);
    }

    #[tokio::test]
    async fn opens_index_written_by_earlier_tooling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rss_storage.sqlite");
        {
            let legacy = rusqlite::Connection::open(&path).unwrap();
            legacy
                .execute_batch(
                    r#"CREATE TABLE rss_items (
                           source TEXT, pubDate TEXT, title TEXT, link TEXT,
                           PRIMARY KEY (source, pubDate, title));
                       CREATE TABLE sentiment (
                           source TEXT, pubDate TEXT, title TEXT,
                           sentiment INTEGER, explanation TEXT,
                           PRIMARY KEY (source, pubDate, title));
                       INSERT INTO rss_items VALUES
                           ('wire', 'Sun, 15 Jun 2025 16:52:25 +0000', 'a', 'https://x/a'),
                           ('wire', 'Sun, 15 Jun 2025 16:52:25 +0000', 'b', 'https://x/b');
                       INSERT INTO sentiment VALUES
                           ('wire', 'Sun, 15 Jun 2025 16:52:25 +0000', 'a', 1, 'upbeat');"#,
                )
                .unwrap();
        }

        let repo = Repository::open(&path).await.unwrap();
        assert_eq!(repo.list_unscored().await.unwrap(), vec![key("b")]);
        assert_eq!(
            repo.get_sentiment(key("a")).await.unwrap().map(|r| r.sentiment),
            Some(Sentiment::Positive)
        );
        assert!(repo
            .insert_sentiment(SentimentRecord {
                key: key("b"),
                sentiment: Sentiment::Neutral,
                explanation: "flat".into(),
            })
            .await
            .unwrap());
        assert!(repo.list_unscored().await.unwrap().is_empty());
    }
}
