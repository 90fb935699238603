mod feed;
mod item;
mod sentiment;

pub use feed::FeedSource;
pub use item::{FeedEntry, IngestOutcome, ItemKey};
pub use sentiment::{Sentiment, SentimentRecord};
