//! Text summarizers.

pub mod openai;

use std::{error::Error, fmt};

use async_trait::async_trait;

pub use openai::{OpenAiConfig, OpenAiSummarizer};

/// Number of sentences kept by [`LeadSentenceSummarizer`].
const LEAD_SENTENCES: usize = 2;

#[derive(Debug)]
pub enum SummarizeError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    EmptyResponse,
    Config(String),
}

impl fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "summary request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "summary service returned {status}: {body}")
            }
            Self::EmptyResponse => write!(f, "summary service returned no content"),
            Self::Config(message) => write!(f, "invalid summarizer configuration: {message}"),
        }
    }
}

impl Error for SummarizeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SummarizeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

/// Condenses a block of text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Summarizes `text`.
    ///
    /// # Errors
    /// Returns `SummarizeError` when no summary could be produced.
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

/// Offline summarizer that keeps the leading sentences of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadSentenceSummarizer;

#[async_trait]
impl Summarizer for LeadSentenceSummarizer {
    fn name(&self) -> &'static str {
        "lead-sentence"
    }

    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let lead = lead_sentences(text, LEAD_SENTENCES);
        if lead.is_empty() {
            return Err(SummarizeError::EmptyResponse);
        }
        Ok(lead)
    }
}

fn lead_sentences(text: &str, count: usize) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut end = text.len();
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') && chars.peek().is_none_or(|(_, next)| *next == ' ') {
            seen += 1;
            if seen == count {
                end = index + ch.len_utf8();
                break;
            }
        }
    }
    text[..end].trim().to_string()
}
