//! Eva - insurance quoting assistant API
//!
//! Serves the Eva chat flow for an auto insurance agency: a scripted
//! conversation that collects vehicles by VIN, prices a non-binding monthly
//! estimate, captures contact details and forwards the lead to the agency.
//! A form-style quote endpoint and a VIN lookup sit alongside the chat.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod knowledge;
mod leads;
mod pricing;
mod providers;
mod routes;
mod vin;

use crate::config::{AgencyConfig, Config};
use crate::core::{ConversationEngine, SessionRegistry, SessionStore};
use crate::leads::{LeadDispatcher, SheetsLeadClient};
use crate::vin::{CachedDecoder, NhtsaClient, VinDecoder};

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub agency: Arc<AgencyConfig>,
    pub sessions: Arc<SessionRegistry>,
    pub decoder: Arc<dyn VinDecoder>,
    pub leads: Arc<LeadDispatcher>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eva_quote=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let agency = Arc::new(AgencyConfig::load(config.agency_config.as_deref())?);
    tracing::info!(
        "🏢 Agency: {} (assistant {})",
        agency.agency.name,
        agency.agency.assistant_name
    );

    let nhtsa = NhtsaClient::new(config.vin_service_url.clone()).with_retries(
        agency.vin.retry_attempts,
        Duration::from_millis(agency.vin.backoff_ms),
    );
    let decoder: Arc<dyn VinDecoder> = Arc::new(CachedDecoder::new(Arc::new(nhtsa)));

    let sheets = SheetsLeadClient::new(config.lead_endpoint_url.clone());
    if !sheets.is_enabled() {
        tracing::warn!("LEAD_ENDPOINT_URL not set, leads will not be forwarded");
    }
    let leads = Arc::new(
        LeadDispatcher::new(Arc::new(sheets)).with_retention(config.session_ttl()),
    );

    let fallback = providers::fallback_from_config(&config, &agency.agency, &agency.fallback)?;
    tracing::info!("🤖 Fallback provider: {}", config.fallback_provider);

    let store = Arc::new(SessionStore::new(&config.database_path(), config.session_ttl()).await?);

    let engine = Arc::new(ConversationEngine::new(
        agency.clone(),
        decoder.clone(),
        leads.clone(),
        Arc::from(fallback),
    ));

    let sessions = Arc::new(SessionRegistry::new(engine, store));
    let sweeper = Arc::clone(&sessions);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep().await;
        }
    });

    let state = AppState {
        config,
        agency,
        sessions,
        decoder,
        leads,
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🚗 Eva API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
