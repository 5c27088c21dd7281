//! Lead submission
//!
//! Completed quotes are forwarded to an external intake endpoint. Delivery is
//! best-effort and at-most-once per idempotency key: the conversation never
//! waits on it and failures only reach the logs.

mod sheets;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::state::UserData;
use crate::core::validation::format_phone;
use crate::pricing::{estimate_fleet_price, estimate_vehicle_price};

pub use sheets::SheetsLeadClient;

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("Lead request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Lead endpoint returned status {0}")]
    Status(u16),

    #[error("Lead submission is disabled")]
    Disabled,
}

/// Identity and contact fields of a lead
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadContact {
    pub name: String,
    pub birth_date: String,
    pub document: String,
    pub address: String,
    pub email: String,
    pub phone: String,
}

/// One vehicle as serialized into its `vehiculo{i}` field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadVehicle {
    pub vin: String,
    pub year: String,
    pub make: String,
    pub model: String,
    pub body_class: String,
    pub estimated: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeadPayload {
    pub contact: LeadContact,
    pub idempotency_key: String,
    pub vehicles: Vec<LeadVehicle>,
    pub total_estimate: f64,
    pub timestamp: String,
}

impl LeadPayload {
    pub fn new(
        contact: LeadContact,
        vehicles: Vec<LeadVehicle>,
        total_estimate: f64,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            contact,
            idempotency_key: idempotency_key.into(),
            vehicles,
            total_estimate,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Package a conversation's collected data. Uses the quoted total when
    /// one was shown, otherwise prices the fleet now.
    pub fn from_user_data(data: &UserData, idempotency_key: impl Into<String>) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();

        let phone = data
            .phone
            .as_deref()
            .map(|p| format_phone(p).unwrap_or_else(|| p.to_string()))
            .unwrap_or_default();

        let contact = LeadContact {
            name: field(&data.name),
            birth_date: field(&data.birth_date),
            document: field(&data.document_number),
            address: field(&data.address),
            email: field(&data.email),
            phone,
        };

        let vehicles = data
            .vehicles
            .iter()
            .map(|v| LeadVehicle {
                vin: v.vin.clone().unwrap_or_default(),
                year: v.attributes.year.clone(),
                make: v.attributes.make.clone(),
                model: v.attributes.model.clone(),
                body_class: v.attributes.body_class.clone(),
                estimated: estimate_vehicle_price(v),
            })
            .collect();

        let total = data
            .quote_amount
            .unwrap_or_else(|| estimate_fleet_price(&data.vehicles));

        Self::new(contact, vehicles, total, idempotency_key)
    }

    /// Multipart field list in wire order
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let c = &self.contact;
        let mut fields = vec![
            ("nombre".to_string(), c.name.clone()),
            ("nacimiento".to_string(), c.birth_date.clone()),
            ("documento".to_string(), c.document.clone()),
            ("direccion".to_string(), c.address.clone()),
            ("email".to_string(), c.email.clone()),
            ("telefono".to_string(), c.phone.clone()),
        ];

        if !self.idempotency_key.is_empty() {
            fields.push(("idempotencyKey".to_string(), self.idempotency_key.clone()));
        }

        let count = self.vehicles.len().clamp(1, 5);
        fields.push(("cantidadVehiculos".to_string(), count.to_string()));
        fields.push(("totalEstimado".to_string(), self.total_estimate.to_string()));

        for (idx, vehicle) in self.vehicles.iter().enumerate() {
            // LeadVehicle only holds strings and integers
            let json = serde_json::to_string(vehicle).unwrap_or_default();
            fields.push((format!("vehiculo{}", idx), json));
        }

        fields.push(("timestamp".to_string(), self.timestamp.clone()));
        fields
    }
}

/// Delivers a lead to the intake endpoint
#[async_trait]
pub trait LeadSubmitter: Send + Sync {
    async fn submit(&self, lead: &LeadPayload) -> Result<(), LeadError>;
}

/// What happened to a dispatched lead. Only ever consumed for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadOutcome {
    Sent,
    Skipped,
    Failed(String),
}

/// Fire-and-forget dispatcher with an idempotency guard.
///
/// Keys are remembered for the retention window, then forgotten.
pub struct LeadDispatcher {
    submitter: Arc<dyn LeadSubmitter>,
    submitted: Mutex<HashMap<String, DateTime<Utc>>>,
    retention: Duration,
}

impl LeadDispatcher {
    pub fn new(submitter: Arc<dyn LeadSubmitter>) -> Self {
        Self {
            submitter,
            submitted: Mutex::new(HashMap::new()),
            retention: Duration::hours(24),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Spawn the submission in the background.
    ///
    /// Returns `None` without sending when the key was already dispatched.
    pub async fn dispatch(&self, lead: LeadPayload) -> Option<JoinHandle<LeadOutcome>> {
        {
            let now = Utc::now();
            let cutoff = now - self.retention;
            let mut submitted = self.submitted.lock().await;
            submitted.retain(|_, at| *at >= cutoff);
            if submitted.contains_key(&lead.idempotency_key) {
                tracing::debug!(
                    idempotency_key = %lead.idempotency_key,
                    "Lead already dispatched, skipping"
                );
                return None;
            }
            submitted.insert(lead.idempotency_key.clone(), now);
        }

        let submitter = Arc::clone(&self.submitter);
        Some(tokio::spawn(async move {
            match submitter.submit(&lead).await {
                Ok(()) => {
                    tracing::info!(
                        event = "sent_to_sheets",
                        idempotency_key = %lead.idempotency_key,
                        vehicles = lead.vehicles.len(),
                        "Lead submitted"
                    );
                    LeadOutcome::Sent
                }
                Err(LeadError::Disabled) => {
                    tracing::info!(
                        idempotency_key = %lead.idempotency_key,
                        "Lead endpoint not configured, submission skipped"
                    );
                    LeadOutcome::Skipped
                }
                Err(e) => {
                    tracing::warn!(
                        idempotency_key = %lead.idempotency_key,
                        error = %e,
                        "Lead submission failed"
                    );
                    LeadOutcome::Failed(e.to_string())
                }
            }
        }))
    }

    pub async fn was_dispatched(&self, idempotency_key: &str) -> bool {
        let cutoff = Utc::now() - self.retention;
        self.submitted
            .lock()
            .await
            .get(idempotency_key)
            .is_some_and(|at| *at >= cutoff)
    }
}
