//! Vehicle identification numbers and decoding

mod cache;
mod nhtsa;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::VehicleLike;

pub use cache::CachedDecoder;
pub use nhtsa::{NhtsaClient, DEFAULT_BASE_URL as NHTSA_BASE_URL};

static VIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").expect("static VIN pattern"));

/// Exactly 17 characters from A-Z and 0-9, excluding I, O and Q.
///
/// Strict: callers normalize user input with [`normalize_vin`] first.
pub fn is_valid_vin(vin: &str) -> bool {
    VIN_PATTERN.is_match(vin)
}

pub fn normalize_vin(input: &str) -> String {
    input.trim().to_uppercase()
}

#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Vehicle data request failed: {0}")]
    Request(String),

    #[error("Vehicle data service returned status {0}")]
    Status(u16),

    #[error("Invalid response from vehicle data service: {0}")]
    InvalidResponse(String),

    #[error("No usable vehicle data for VIN {0}")]
    NoData(String),
}

impl From<reqwest::Error> for DecodeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => DecodeError::Status(status.as_u16()),
            None => DecodeError::Request(err.to_string()),
        }
    }
}

/// Flat decoded attributes. Empty strings mean the service had no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleAttributes {
    pub year: String,
    pub make: String,
    pub model: String,
    pub body_class: String,
    pub vehicle_type: String,
    pub fuel_type: String,
    #[serde(rename = "engineHP")]
    pub engine_hp: String,
    pub engine_cylinders: String,
    #[serde(rename = "displacementL")]
    pub displacement_l: String,
    pub drive_type: String,
    pub transmission_style: String,
    pub transmission_speeds: String,
    pub doors: String,
    pub seats: String,
    pub gvwr: String,
    pub series: String,
    pub trim: String,
    pub plant_country: String,
    pub plant_city: String,
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

impl VehicleAttributes {
    /// Year, make and model are all missing
    pub fn is_empty(&self) -> bool {
        non_empty(&self.year).is_none()
            && non_empty(&self.make).is_none()
            && non_empty(&self.model).is_none()
    }

    /// Year, make and model are all present
    pub fn is_complete(&self) -> bool {
        non_empty(&self.year).is_some()
            && non_empty(&self.make).is_some()
            && non_empty(&self.model).is_some()
    }
}

impl VehicleLike for VehicleAttributes {
    fn make(&self) -> Option<&str> {
        non_empty(&self.make)
    }
    fn model(&self) -> Option<&str> {
        non_empty(&self.model)
    }
    fn body_class(&self) -> Option<&str> {
        non_empty(&self.body_class)
    }
    fn year(&self) -> Option<&str> {
        non_empty(&self.year)
    }
    fn engine_hp(&self) -> Option<&str> {
        non_empty(&self.engine_hp)
    }
    fn drive_type(&self) -> Option<&str> {
        non_empty(&self.drive_type)
    }
}

/// Anything that can turn a VIN into vehicle attributes
#[async_trait]
pub trait VinDecoder: Send + Sync {
    async fn decode(&self, vin: &str) -> Result<VehicleAttributes, DecodeError>;
}
