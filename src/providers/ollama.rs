//! Local models served by Ollama

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, ProviderError};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn<'a>>,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request<'a>(completion: &'a Completion<'a>) -> ChatRequest<'a> {
        ChatRequest {
            model: if completion.model.is_empty() {
                DEFAULT_OLLAMA_MODEL
            } else {
                completion.model
            },
            messages: completion
                .messages
                .iter()
                .map(|m| ChatTurn {
                    role: m.role_name(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: SamplingOptions {
                temperature: completion.temperature,
                num_predict: completion.max_tokens,
            },
        }
    }

    pub async fn complete(&self, completion: &Completion<'_>) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&Self::request(completion))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidResponse(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let reply: ChatReply = response.json().await?;
        if !reply.done {
            tracing::debug!("Ollama reply not marked done, using partial content");
        }
        if reply.message.content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("Empty completion".into()));
        }
        Ok(reply.message.content)
    }
}
