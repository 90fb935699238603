mod extractor;

pub use extractor::{extract_item, html_to_text, ExtractedItem};
