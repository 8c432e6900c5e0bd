//! HTTP scoring oracle against an OpenAI-compatible chat-completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::oracle::{OracleError, ScoringOracle};

/// Connection settings for the HTTP oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOracleConfig {
    /// API base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Bearer token.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    /// Sampling temperature; grading wants it low.
    pub temperature: f64,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.1,
        }
    }
}

/// Chat-completions client implementing [`ScoringOracle`].
pub struct HttpOracle {
    config: HttpOracleConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ScoringOracle for HttpOracle {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::from_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(OracleError::EmptyCompletion);
        }

        debug!(chars = content.len(), "oracle completion received");
        Ok(content)
    }
}
