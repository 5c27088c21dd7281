//! AI provider integrations
//!
//! Only used for the free-text fallback: turns the rules can't place get a
//! short reply from a chat model, bounded by the safety prompt.

mod ollama;
mod openai_compat;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::client::FallbackConfig;
use crate::config::prompts::fallback_system_prompt;
use crate::config::{AgencyInfo, Config};
use crate::conversation::{ChatMessage, Role};
use crate::core::state::UserData;

pub use ollama::OllamaClient;
pub use openai_compat::{CompletionsEndpoint, OpenAiClient};

/// Fallback replies are a sentence or two
const REPLY_TOKEN_LIMIT: u32 = 300;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A message as sent to a chat model
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role_name(&self) -> &'static str {
        match self.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl From<&ChatMessage> for PromptMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self::new(msg.role, msg.content.clone())
    }
}

/// One completion call
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub messages: &'a [PromptMessage],
    /// Empty selects the backend's default model
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub enum Provider {
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
}

impl Provider {
    pub fn from_name(name: &str, config: &Config) -> Result<Self, ProviderError> {
        match name.to_lowercase().as_str() {
            "ollama" => {
                let url = config
                    .ollama_url
                    .as_deref()
                    .unwrap_or(ollama::DEFAULT_OLLAMA_URL);
                Ok(Provider::Ollama(OllamaClient::new(url)))
            }
            "openai" => {
                let model = config.fallback_model.clone().unwrap_or_default();
                let endpoint = match (&config.openai_api_key, &config.openai_base_url) {
                    (key, Some(base_url)) => {
                        let endpoint = CompletionsEndpoint::self_hosted(base_url.clone(), model);
                        match key {
                            Some(key) => endpoint.with_key(key.clone()),
                            None => endpoint,
                        }
                    }
                    (Some(key), None) => CompletionsEndpoint::hosted(key.clone()),
                    (None, None) => {
                        return Err(ProviderError::NotConfigured(
                            "OPENAI_API_KEY or OPENAI_BASE_URL must be set".into(),
                        ))
                    }
                };
                Ok(Provider::OpenAi(OpenAiClient::new(endpoint)))
            }
            _ => Err(ProviderError::UnknownProvider(name.to_string())),
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::Ollama(_) => ollama::DEFAULT_OLLAMA_MODEL,
            // Empty defers to the endpoint's model
            Provider::OpenAi(_) => "",
        }
    }

    pub async fn complete(&self, completion: &Completion<'_>) -> Result<String, ProviderError> {
        match self {
            Provider::Ollama(client) => client.complete(completion).await,
            Provider::OpenAi(client) => client.complete(completion).await,
        }
    }
}

/// Answers free text that no rule handled
#[async_trait]
pub trait FallbackResponder: Send + Sync {
    async fn respond(&self, history: &[ChatMessage], data: &UserData)
        -> Result<String, ProviderError>;
}

/// Fallback backed by a chat model
pub struct AiFallback {
    provider: Provider,
    model: String,
    system_prompt: String,
    history_window: usize,
    temperature: f32,
}

impl AiFallback {
    pub fn new(
        provider: Provider,
        model: Option<String>,
        agency: &AgencyInfo,
        fallback: &FallbackConfig,
    ) -> Self {
        let model = model.unwrap_or_else(|| provider.default_model().to_string());
        Self {
            provider,
            model,
            system_prompt: fallback_system_prompt(agency, fallback),
            history_window: fallback.history_window,
            temperature: fallback.temperature,
        }
    }

    /// System prompt, a one-line progress note, then the recent transcript
    fn build_prompt(&self, history: &[ChatMessage], data: &UserData) -> Vec<PromptMessage> {
        let start = history.len().saturating_sub(self.history_window);
        let mut prompt = vec![
            PromptMessage::new(Role::System, self.system_prompt.clone()),
            PromptMessage::new(
                Role::System,
                format!(
                    "Paso actual de la conversación: {}. Vehículos: {}.",
                    data.current_step.as_str(),
                    data.vehicles.len()
                ),
            ),
        ];
        prompt.extend(
            history[start..]
                .iter()
                .filter(|m| m.role != Role::System)
                .map(PromptMessage::from),
        );
        prompt
    }
}

#[async_trait]
impl FallbackResponder for AiFallback {
    async fn respond(
        &self,
        history: &[ChatMessage],
        data: &UserData,
    ) -> Result<String, ProviderError> {
        let prompt = self.build_prompt(history, data);
        let completion = Completion {
            messages: &prompt,
            model: &self.model,
            temperature: self.temperature,
            max_tokens: REPLY_TOKEN_LIMIT,
        };
        let reply = self.provider.complete(&completion).await?;
        Ok(reply.trim().to_string())
    }
}

/// Used when no provider is configured
pub struct NoFallback;

#[async_trait]
impl FallbackResponder for NoFallback {
    async fn respond(&self, _: &[ChatMessage], _: &UserData) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured("fallback provider".into()))
    }
}

/// Build the responder selected by `FALLBACK_PROVIDER`
pub fn fallback_from_config(
    config: &Config,
    agency: &AgencyInfo,
    fallback: &FallbackConfig,
) -> Result<Box<dyn FallbackResponder>, ProviderError> {
    if config.fallback_provider.eq_ignore_ascii_case("none") {
        return Ok(Box::new(NoFallback));
    }
    let provider = Provider::from_name(&config.fallback_provider, config)?;
    Ok(Box::new(AiFallback::new(
        provider,
        config.fallback_model.clone(),
        agency,
        fallback,
    )))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Replies with a fixed string, or fails
    pub struct CannedFallback(pub Option<String>);

    #[async_trait]
    impl FallbackResponder for CannedFallback {
        async fn respond(&self, _: &[ChatMessage], _: &UserData) -> Result<String, ProviderError> {
            self.0
                .clone()
                .ok_or_else(|| ProviderError::InvalidResponse("canned failure".into()))
        }
    }
}
