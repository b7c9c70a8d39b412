//! Chat-completions client for OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SummarizeError, Summarizer};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise summaries of text. \
Keep summaries to 1-2 sentences. Reply in the form:\nTitle: <a short title>\nSummary: <the summary>";

/// Longest error body kept in `SummarizeError::Status`.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl OpenAiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Summarizer backed by a chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiSummarizer {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiSummarizer {
    /// Builds a client for `config`.
    ///
    /// # Errors
    /// Returns `SummarizeError::Config` if the API key is blank, or
    /// `SummarizeError::Http` if the HTTP client cannot be created.
    pub fn new(config: OpenAiConfig) -> Result<Self, SummarizeError> {
        if config.api_key.trim().is_empty() {
            return Err(SummarizeError::Config("API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("summit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let prompt = format!("Please summarize this text: {text}");
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(SummarizeError::EmptyResponse)?;
        debug!(model = %self.config.model, chars = content.len(), "received summary");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/v1")
    }

    async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer test-key");
        let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
        if !authorized || body["max_tokens"] != 100 || !prompt.starts_with("Please summarize this text: ") {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad request" })));
        }
        (
            StatusCode::OK,
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "  Title: Growth\nSummary: Sales rose.  " } }]
            })),
        )
    }

    #[tokio::test]
    async fn returns_trimmed_first_choice() {
        let base = serve(Router::new().route("/v1/chat/completions", post(completions))).await;
        let summarizer = OpenAiSummarizer::new(OpenAiConfig::new("test-key").with_base_url(base))
            .expect("client should build");
        let summary = summarizer
            .summarize("Sales rose sharply in every region this quarter.")
            .await
            .expect("mock should answer");
        assert_eq!(summary, "Title: Growth\nSummary: Sales rose.");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let base = serve(Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        ))
        .await;
        let summarizer = OpenAiSummarizer::new(OpenAiConfig::new("test-key").with_base_url(base))
            .expect("client should build");
        let err = summarizer.summarize("text").await.expect_err("429 should fail");
        assert!(matches!(err, SummarizeError::Status { status: 429, ref body } if body == "slow down"));
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let base = serve(Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        ))
        .await;
        let summarizer = OpenAiSummarizer::new(OpenAiConfig::new("test-key").with_base_url(base))
            .expect("client should build");
        let err = summarizer.summarize("text").await.expect_err("no choices");
        assert!(matches!(err, SummarizeError::EmptyResponse));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            OpenAiSummarizer::new(OpenAiConfig::new("  ")),
            Err(SummarizeError::Config(_))
        ));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = OpenAiConfig::new("key").with_base_url("http://localhost:9/v1/");
        assert_eq!(config.endpoint(), "http://localhost:9/v1/chat/completions");
    }
}
