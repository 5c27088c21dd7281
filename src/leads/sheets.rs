//! Spreadsheet-backed intake endpoint

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;

use super::{LeadError, LeadPayload, LeadSubmitter};

/// Posts leads as multipart form data. The response body is ignored.
pub struct SheetsLeadClient {
    client: Client,
    endpoint: Option<String>,
}

impl SheetsLeadClient {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl LeadSubmitter for SheetsLeadClient {
    async fn submit(&self, lead: &LeadPayload) -> Result<(), LeadError> {
        let endpoint = self.endpoint.as_deref().ok_or(LeadError::Disabled)?;

        let form = lead
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value));

        let response = self.client.post(endpoint).multipart(form).send().await?;

        if !response.status().is_success() {
            return Err(LeadError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}
