mod backfill;
mod ollama;
mod sentiment;
mod supervisor;

pub use backfill::{BackfillEngine, BackfillReport, Scorer};
pub use ollama::OllamaClient;
pub use sentiment::{build_prompt, parse_sentiment, SentimentParseError};
pub use supervisor::{InferenceSupervisor, SupervisorState};
