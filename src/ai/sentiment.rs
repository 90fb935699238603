use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::models::Sentiment;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentimentParseError {
    #[error("expected an integer followed by whitespace and an explanation")]
    Format,
    #[error("sentiment {0} is not one of -1, 0, 1")]
    InvalidValue(i64),
    #[error("explanation is empty")]
    EmptyExplanation,
}

pub fn build_prompt(title: &str, description: &str) -> String {
    format!(
        "Analyze the sentiment of this news item:\n\n\
         Title: {title}\n\
         Description: {description}\n\n\
         Is it positive, neutral, or negative? \
         Start your response with -1 for negative, 0 for neutral or 1 for positive, \
         followed by a space and a short explanation. \
         The label is used to decide whether the item is likely to distress a reader, \
         so anything that could cause distress must be labelled negative."
    )
}

/// Parse `<label> <explanation>` where the label is -1, 0 or 1.
pub fn parse_sentiment(text: &str) -> Result<(Sentiment, String), SentimentParseError> {
    let caps = response_re()
        .captures(text.trim_start())
        .ok_or(SentimentParseError::Format)?;

    let value: i64 = caps[1]
        .parse()
        .map_err(|_| SentimentParseError::Format)?;
    let sentiment = Sentiment::from_value(value).ok_or(SentimentParseError::InvalidValue(value))?;

    let explanation = caps.get(2).map_or("", |m| m.as_str()).trim();
    if explanation.is_empty() {
        return Err(SentimentParseError::EmptyExplanation);
    }

    Ok((sentiment, explanation.to_string()))
}

fn response_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Label, then whitespace or end of input, then the rest.
    RE.get_or_init(|| Regex::new(r"(?s)^(-?[0-9]+)(?:\s+(.*))?$").expect("valid regex"))
}
