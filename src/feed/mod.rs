mod feed_list;
mod fetcher;
mod parser;

pub use feed_list::{load_feed_list, parse_opml_feeds, parse_toml_feeds, parse_yaml_feeds};
pub use fetcher::FeedFetcher;
pub use parser::{decode_document, parse_feed_document, parse_raw_item};
