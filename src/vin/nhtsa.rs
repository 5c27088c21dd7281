//! NHTSA vPIC client
//!
//! Two sequential calls: `decodevin` discovers the model year from a flat
//! variable/value list, then `decodevinvaluesextended` fetches a single
//! attribute row using that year. The row wins per field; the flat list
//! fills gaps.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{DecodeError, VehicleAttributes, VinDecoder};

pub const DEFAULT_BASE_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles";

pub struct NhtsaClient {
    client: Client,
    base_url: String,
    attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct VariableResults {
    #[serde(rename = "Results", default)]
    results: Vec<VariableValue>,
}

#[derive(Debug, Deserialize)]
struct VariableValue {
    #[serde(rename = "Variable")]
    variable: Option<String>,
    #[serde(rename = "Value")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowResults {
    #[serde(rename = "Results", default)]
    results: Vec<HashMap<String, Value>>,
}

impl NhtsaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            attempts: 3,
            backoff: Duration::from_millis(300),
        }
    }

    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// GET with linear backoff between attempts. Non-2xx counts as a failure.
    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, DecodeError> {
        let mut last_error = DecodeError::Request("no attempts made".to_string());

        for attempt in 1..=self.attempts {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "vehicle data request failed");
                    last_error = e;
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        Err(last_error)
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, DecodeError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DecodeError::Status(response.status().as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DecodeError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl VinDecoder for NhtsaClient {
    async fn decode(&self, vin: &str) -> Result<VehicleAttributes, DecodeError> {
        let basic: VariableResults = self
            .fetch_json(&format!("{}/decodevin/{}?format=json", self.base_url, vin))
            .await?;
        let flat = flatten_variables(basic.results);

        let mut url = format!(
            "{}/decodevinvaluesextended/{}?format=json",
            self.base_url, vin
        );
        if let Some(year) = flat.get("Model Year") {
            url.push_str("&modelyear=");
            url.push_str(year);
        }

        let extended: RowResults = self.fetch_json(&url).await?;
        let row = extended.results.into_iter().next().unwrap_or_default();

        let attrs = merge_attributes(&row, &flat);
        if attrs.is_empty() {
            return Err(DecodeError::NoData(vin.to_string()));
        }

        tracing::debug!(vin, year = %attrs.year, make = %attrs.make, model = %attrs.model, "VIN decoded");
        Ok(attrs)
    }
}

fn flatten_variables(results: Vec<VariableValue>) -> HashMap<String, String> {
    results
        .into_iter()
        .filter_map(|r| match (r.variable, r.value) {
            (Some(variable), Some(value)) if !value.is_empty() => Some((variable, value)),
            _ => None,
        })
        .collect()
}

fn row_str(row: &HashMap<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn merge_attributes(row: &HashMap<String, Value>, flat: &HashMap<String, String>) -> VehicleAttributes {
    let pick = |row_key: &str, flat_key: Option<&str>| -> String {
        row_str(row, row_key)
            .or_else(|| flat_key.and_then(|k| flat.get(k).cloned()))
            .unwrap_or_default()
    };

    VehicleAttributes {
        year: pick("ModelYear", Some("Model Year")),
        make: pick("Make", Some("Make")),
        model: pick("Model", Some("Model")),
        body_class: pick("BodyClass", Some("Body Class")),
        vehicle_type: pick("VehicleType", None),
        fuel_type: row_str(row, "FuelTypePrimary")
            .or_else(|| row_str(row, "Fuel Type - Primary"))
            .unwrap_or_default(),
        engine_hp: pick("EngineHP", Some("Engine HP")),
        engine_cylinders: pick("EngineCylinders", None),
        displacement_l: pick("DisplacementL", None),
        drive_type: pick("DriveType", Some("Drive Type")),
        transmission_style: pick("TransmissionStyle", None),
        transmission_speeds: pick("TransmissionSpeeds", None),
        doors: pick("Doors", None),
        seats: pick("Seats", None),
        gvwr: pick("GVWR", None),
        series: pick("Series", None),
        trim: pick("Trim", None),
        plant_country: pick("PlantCountry", None),
        plant_city: pick("PlantCity", None),
    }
}
