use std::sync::Arc;

use summit_core::summarize::{OpenAiConfig, OpenAiSummarizer};
use summit_core::{LeadSentenceSummarizer, SummarizeError, Summarizer};
use tracing::{info, warn};

use crate::config::SummitConfig;

/// Builds the summarizer for the configured backend.
///
/// Without an API key (only allowed in debug mode) summaries fall back to the
/// leading sentences of each section.
pub fn build_summarizer(config: &SummitConfig) -> Result<Arc<dyn Summarizer>, SummarizeError> {
    let Some(api_key) = config.openai.api_key.as_deref() else {
        warn!("OPENAI_API_KEY not set; using lead-sentence summaries");
        return Ok(Arc::new(LeadSentenceSummarizer));
    };

    let openai = OpenAiConfig::new(api_key)
        .with_base_url(config.openai.base_url.clone())
        .with_model(config.openai.model.clone())
        .with_timeout(config.openai.timeout);
    info!(model = %openai.model, base_url = %openai.base_url, "using chat-completions summarizer");
    Ok(Arc::new(OpenAiSummarizer::new(openai)?))
}
