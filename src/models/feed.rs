use serde::{Deserialize, Serialize};

/// One configured feed: `name` doubles as the storage source name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}
