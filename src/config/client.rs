//! Agency configuration loaded from TOML files
//!
//! Each deployment of the assistant has an agency configuration that defines:
//! - Agency identity and contact channels
//! - Chat limits
//! - Vehicle data service retry policy
//! - Free-text fallback settings

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root agency configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencyConfig {
    #[serde(default)]
    pub agency: AgencyInfo,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub vin: VinConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl AgencyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgencyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=5).contains(&self.chat.max_vehicles) {
            return Err(ConfigError::Validation(format!(
                "chat.max_vehicles must be between 1 and 5, got {}",
                self.chat.max_vehicles
            )));
        }
        if self.chat.max_message_length == 0 {
            return Err(ConfigError::Validation(
                "chat.max_message_length must be positive".to_string(),
            ));
        }
        if self.vin.retry_attempts == 0 {
            return Err(ConfigError::Validation(
                "vin.retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Agency identity and contact channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyInfo {
    #[serde(default = "default_agency_name")]
    pub name: String,

    /// Display name of the assistant
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default = "default_phones")]
    pub phones: Vec<String>,

    #[serde(default = "default_whatsapp")]
    pub whatsapp: String,

    #[serde(default = "default_offices")]
    pub offices: Vec<Office>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub name: String,
    pub address: String,
}

fn default_agency_name() -> String {
    "Intercoast Insurance".to_string()
}

fn default_assistant_name() -> String {
    "Eva".to_string()
}

fn default_phones() -> Vec<String> {
    vec!["+1 (562) 381-2012".to_string(), "+1 (424) 417-1700".to_string()]
}

fn default_whatsapp() -> String {
    "+1 (775) 675-4559".to_string()
}

fn default_offices() -> Vec<Office> {
    vec![
        Office {
            name: "South Gate".to_string(),
            address: "5863 Imperial Hwy, South Gate, CA 90280".to_string(),
        },
        Office {
            name: "Compton".to_string(),
            address: "920 N Long Beach Blvd I, Compton, CA 90221".to_string(),
        },
    ]
}

impl Default for AgencyInfo {
    fn default() -> Self {
        Self {
            name: default_agency_name(),
            assistant_name: default_assistant_name(),
            phones: default_phones(),
            whatsapp: default_whatsapp(),
            offices: default_offices(),
        }
    }
}

impl AgencyInfo {
    /// WhatsApp number as digits only, for wa.me links
    pub fn whatsapp_digits(&self) -> String {
        self.whatsapp.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Longer user input is truncated
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    #[serde(default = "default_max_vehicles")]
    pub max_vehicles: usize,
}

fn default_max_message_length() -> usize {
    500
}

fn default_max_vehicles() -> usize {
    5
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
            max_vehicles: default_max_vehicles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VinConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Linear backoff unit; attempt `n` waits `n * backoff_ms`
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    300
}

impl Default for VinConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Number of recent transcript messages sent to the provider
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Replaces the built-in safety prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_history_window() -> usize {
    6
}

fn default_temperature() -> f32 {
    0.4
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            temperature: default_temperature(),
            system_prompt: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
