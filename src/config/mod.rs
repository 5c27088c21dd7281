//! Application configuration

pub mod client;
pub mod messages;
pub mod prompts;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use client::{AgencyConfig, AgencyInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub agency_config: Option<PathBuf>,
    pub vin_service_url: String,
    /// Lead intake endpoint; submission is disabled when unset
    pub lead_endpoint_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub ollama_url: Option<String>,
    /// "openai", "ollama" or "none"
    pub fallback_provider: String,
    pub fallback_model: Option<String>,
    pub session_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let session_ttl_minutes = match env::var("SESSION_TTL_MINUTES") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| anyhow::anyhow!("SESSION_TTL_MINUTES must be a positive integer, got {:?}", raw))?,
            Err(_) => 90,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            data_dir: env::var("EVA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            agency_config: env::var("EVA_AGENCY_CONFIG").ok().map(PathBuf::from),
            vin_service_url: env::var("VIN_SERVICE_URL")
                .unwrap_or_else(|_| crate::vin::NHTSA_BASE_URL.into()),
            lead_endpoint_url: env::var("LEAD_ENDPOINT_URL").ok().filter(|u| !u.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            ollama_url: env::var("OLLAMA_URL").ok(),
            fallback_provider: env::var("FALLBACK_PROVIDER").unwrap_or_else(|_| "none".into()),
            fallback_model: env::var("FALLBACK_MODEL").ok(),
            session_ttl_minutes,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("eva.db")
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }
}
