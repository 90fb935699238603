use std::path::PathBuf;

use thiserror::Error;

use crate::ai::SentimentParseError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unparseable publication timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Raw item file not found: {}", .0.display())]
    RawItemMissing(PathBuf),

    #[error("Extracted text is empty")]
    EmptyText,

    #[error("Inference service unreachable at {0}")]
    InferenceUnreachable(String),

    #[error("Failed to launch inference service {program:?}: {source}")]
    InferenceLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference API error: {0}")]
    InferenceApi(String),

    #[error("Sentiment response rejected: {0}")]
    Sentiment(#[from] SentimentParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
