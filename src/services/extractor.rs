use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::feed::parse_raw_item;

/// Wide enough that html2text never wraps; whitespace is collapsed afterwards anyway.
const RENDER_WIDTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    pub title: String,
    pub text: String,
}

/// Pull the title and readable description text out of a stored raw item.
pub fn extract_item(raw_item: &str) -> Result<ExtractedItem> {
    let entry = parse_raw_item(raw_item)?;
    let text = entry
        .description
        .as_deref()
        .map(html_to_text)
        .unwrap_or_default();

    if text.is_empty() {
        return Err(AppError::EmptyText);
    }

    Ok(ExtractedItem {
        title: entry.title.unwrap_or_else(|| "No title".to_string()),
        text,
    })
}

/// Text of every `<p>` plus the first image title; the whole fragment as text if neither exists.
pub fn html_to_text(html: &str) -> String {
    let paragraphs: Vec<String> = paragraph_re()
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| render(m.as_str()))
        .filter(|p| !p.is_empty())
        .collect();

    let image_title = image_title_re()
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .filter(|t| !t.is_empty());

    let mut combined = paragraphs.join(" ");
    if let Some(title) = image_title {
        if !combined.is_empty() {
            combined.push(' ');
        }
        combined.push_str(&title);
    }

    if combined.is_empty() {
        render(html)
    } else {
        combined
    }
}

fn render(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), RENDER_WIDTH) {
        Ok(text) => collapse_whitespace(&text),
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            String::new()
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").expect("valid regex"))
}

fn image_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<img\b[^>]*?\btitle\s*=\s*["']([^"']*)["']"#).expect("valid regex")
    })
}
