mod archive;
mod filename;
mod item_store;

pub use archive::{ArchiveCompactor, ArchiveSummary};
pub use filename::{derive_filename, parse_pub_date, MONTH_PREFIX_LEN};
pub use item_store::{IngestSummary, ItemStore};
