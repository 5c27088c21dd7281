//! Non-conversational quote form and VIN lookup

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::validation::format_phone;
use crate::leads::{LeadContact, LeadPayload, LeadVehicle};
use crate::pricing::quote_fleet;
use crate::vin::{is_valid_vin, normalize_vin, DecodeError, VehicleAttributes};
use crate::AppState;

use super::{api_error, ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub document: String,
}

impl From<QuoteContact> for LeadContact {
    fn from(c: QuoteContact) -> Self {
        let phone = format_phone(&c.phone).unwrap_or(c.phone);
        LeadContact {
            name: c.name,
            birth_date: c.birth_date,
            document: c.document,
            address: c.address,
            email: c.email,
            phone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub vins: Vec<String>,
    #[serde(default)]
    pub contact: Option<QuoteContact>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedVehicle {
    pub vin: String,
    #[serde(flatten)]
    pub attributes: VehicleAttributes,
    pub estimated: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub vehicles: Vec<QuotedVehicle>,
    pub subtotal: f64,
    /// Fraction in `0.0..=0.30`
    pub discount: f64,
    pub total: f64,
    pub lead_submitted: bool,
}

/// Price a list of VINs without going through the conversation
async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let max = state.agency.chat.max_vehicles;
    if request.vins.is_empty() || request.vins.len() > max {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Ingresa entre 1 y {} VINs.", max),
        ));
    }

    let mut vins = Vec::with_capacity(request.vins.len());
    let mut decoded = Vec::with_capacity(request.vins.len());
    for (i, raw) in request.vins.iter().enumerate() {
        let vin = normalize_vin(raw);
        if !is_valid_vin(&vin) {
            return Err(api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "El VIN del vehículo {} no es válido. Debe tener 17 caracteres.",
                    i + 1
                ),
            ));
        }

        let attributes = match state.decoder.decode(&vin).await {
            Ok(attrs) if attrs.is_complete() => attrs,
            Ok(_) | Err(_) => {
                return Err(api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("No se pudo decodificar el VIN del vehículo {}.", i + 1),
                ));
            }
        };
        vins.push(vin);
        decoded.push(attributes);
    }

    let fleet = quote_fleet(&decoded);
    tracing::info!(
        event = "form_quote",
        vehicles = decoded.len(),
        total = fleet.total,
        "Quote form priced"
    );

    let vehicles: Vec<QuotedVehicle> = vins
        .into_iter()
        .zip(decoded)
        .zip(fleet.per_vehicle.iter().copied())
        .map(|((vin, attributes), estimated)| QuotedVehicle {
            vin,
            attributes,
            estimated,
        })
        .collect();

    let lead_submitted = match request.contact {
        Some(contact) => {
            let lead_vehicles = vehicles
                .iter()
                .map(|v| LeadVehicle {
                    vin: v.vin.clone(),
                    year: v.attributes.year.clone(),
                    make: v.attributes.make.clone(),
                    model: v.attributes.model.clone(),
                    body_class: v.attributes.body_class.clone(),
                    estimated: v.estimated,
                })
                .collect();
            let lead = LeadPayload::new(
                contact.into(),
                lead_vehicles,
                fleet.total,
                Uuid::new_v4().to_string(),
            );
            state.leads.dispatch(lead).await.is_some()
        }
        None => false,
    };

    Ok(Json(QuoteResponse {
        vehicles,
        subtotal: fleet.subtotal,
        discount: fleet.discount,
        total: fleet.total,
        lead_submitted,
    }))
}

async fn lookup_vin(
    State(state): State<AppState>,
    Path(vin): Path<String>,
) -> Result<Json<VehicleAttributes>, ApiError> {
    let vin = normalize_vin(&vin);
    if !is_valid_vin(&vin) {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "VIN inválido"));
    }

    state.decoder.decode(&vin).await.map(Json).map_err(|e| {
        tracing::warn!(vin = %vin, error = %e, "VIN lookup failed");
        match e {
            DecodeError::NoData(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
            _ => api_error(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/quote", post(quote))
        .route("/v1/vin/:vin", get(lookup_vin))
}
