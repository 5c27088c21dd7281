//! Chat completions client for OpenAI and servers that mirror its API
//! (Groq, vLLM, LM Studio, LocalAI)

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Completion, ProviderError};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";

/// Where completions are requested and with which credentials
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionsEndpoint {
    pub base_url: String,
    /// Local servers usually run without a key
    pub api_key: Option<String>,
    /// Used when the caller passes an empty model name
    pub model: String,
    pub timeout: Duration,
}

impl CompletionsEndpoint {
    pub fn hosted(api_key: impl Into<String>) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.into(),
            api_key: Some(api_key.into()),
            model: OPENAI_MODEL.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Self-hosted servers get a longer timeout for cold model loads
    pub fn self_hosted(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `error.message` from an API error body, when there is one
fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub struct OpenAiClient {
    endpoint: CompletionsEndpoint,
    client: Client,
}

impl OpenAiClient {
    pub fn new(endpoint: CompletionsEndpoint) -> Self {
        let client = Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { endpoint, client }
    }

    pub async fn complete(&self, completion: &Completion<'_>) -> Result<String, ProviderError> {
        let model = if completion.model.is_empty() {
            self.endpoint.model.as_str()
        } else {
            completion.model
        };
        let request = WireRequest {
            model,
            messages: completion
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role_name(),
                    content: &m.content,
                })
                .collect(),
            temperature: completion.temperature,
            max_tokens: completion.max_tokens,
        };

        let started = Instant::now();
        let mut builder = self.client.post(self.endpoint.url()).json(&request);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            model,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat completion returned"
        );

        if !status.is_success() {
            let detail = api_error_message(&body).unwrap_or(body);
            return Err(ProviderError::InvalidResponse(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let reply: WireReply = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Malformed completion: {}", e)))?;

        reply
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("Empty completion".into()))
    }
}
