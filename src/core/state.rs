//! Conversation state
//!
//! `UserData` is the aggregate threaded through every turn. It is plain data:
//! the engine takes a snapshot, returns the next one, and the session store
//! persists it as JSON.

use serde::{Deserialize, Serialize};

use crate::config::messages;
use crate::pricing::VehicleLike;
use crate::vin::VehicleAttributes;

/// Dialogue steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Welcome,
    PolicyMenu,
    PolicyDetail,
    AskVehicleCount,
    AskBirthdate,
    CollectVehicleInfo,
    ConfirmQuote,
    AskName,
    AskEmail,
    AskPhone,
    AskAddress,
    AskDocument,
    Finish,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Welcome => "welcome",
            Step::PolicyMenu => "policy_menu",
            Step::PolicyDetail => "policy_detail",
            Step::AskVehicleCount => "ask_vehicle_count",
            Step::AskBirthdate => "ask_birthdate",
            Step::CollectVehicleInfo => "collect_vehicle_info",
            Step::ConfirmQuote => "confirm_quote",
            Step::AskName => "ask_name",
            Step::AskEmail => "ask_email",
            Step::AskPhone => "ask_phone",
            Step::AskAddress => "ask_address",
            Step::AskDocument => "ask_document",
            Step::Finish => "finish",
        }
    }

    /// Steps the step's own handler may move to.
    ///
    /// Global jumps (start over, quick replies, resume) are not listed here.
    pub fn successors(self) -> &'static [Step] {
        use Step::*;
        match self {
            Welcome => &[Welcome, PolicyMenu, AskVehicleCount],
            PolicyMenu => &[PolicyMenu, PolicyDetail],
            PolicyDetail => &[PolicyMenu, AskVehicleCount],
            AskVehicleCount => &[AskVehicleCount, AskBirthdate],
            AskBirthdate => &[AskBirthdate, CollectVehicleInfo],
            CollectVehicleInfo => &[CollectVehicleInfo, ConfirmQuote],
            ConfirmQuote => &[ConfirmQuote, AskName, Finish],
            AskName => &[AskEmail],
            AskEmail => &[AskEmail, AskPhone],
            AskPhone => &[AskPhone, AskAddress],
            AskAddress => &[AskDocument],
            AskDocument => &[Finish],
            Finish => &[Finish],
        }
    }

    pub fn can_transition_to(self, next: Step) -> bool {
        self.successors().contains(&next)
    }

    /// Contact capture: free text here is user data, not a question
    pub fn is_contact_capture(self) -> bool {
        matches!(
            self,
            Step::AskName | Step::AskEmail | Step::AskPhone | Step::AskAddress | Step::AskDocument
        )
    }

    /// A snapshot at this step is worth offering to resume
    pub fn is_resumable(self) -> bool {
        !matches!(self, Step::Welcome | Step::Finish)
    }
}

/// Policies shown in the informational menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Auto,
    Hogar,
    Vida,
    Salud,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::Auto,
        PolicyKind::Hogar,
        PolicyKind::Vida,
        PolicyKind::Salud,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PolicyKind::Auto => "Seguro de Auto 🚗",
            PolicyKind::Hogar => "Seguro de Hogar 🏠",
            PolicyKind::Vida => "Seguro de Vida 👨‍👩‍👧",
            PolicyKind::Salud => "Seguro de Salud 🏥",
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            PolicyKind::Auto => messages::AUTO_POLICY_INFO,
            PolicyKind::Hogar => messages::HOME_POLICY_INFO,
            PolicyKind::Vida => messages::LIFE_POLICY_INFO,
            PolicyKind::Salud => messages::HEALTH_POLICY_INFO,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Loose match on free text ("quiero info de hogar")
    pub fn mentioned_in(lower: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            let keyword = match kind {
                PolicyKind::Auto => "auto",
                PolicyKind::Hogar => "hogar",
                PolicyKind::Vida => "vida",
                PolicyKind::Salud => "salud",
            };
            lower.contains(keyword)
        })
    }

    /// Menu options: every policy, then back to start
    pub fn menu_options() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .map(|kind| kind.label())
            .chain(std::iter::once(messages::BACK_TO_START))
            .collect()
    }
}

/// Field pending in the manual vehicle entry sub-flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualField {
    Year,
    Make,
    Model,
    BodyClass,
}

/// One insurable vehicle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(flatten)]
    pub attributes: VehicleAttributes,
}

impl Vehicle {
    #[cfg(test)]
    pub fn decoded(vin: impl Into<String>, attributes: VehicleAttributes) -> Self {
        Self {
            vin: Some(vin.into()),
            attributes,
        }
    }

    /// First primary attribute still blank, in manual entry order
    pub fn missing_field(&self) -> Option<ManualField> {
        let a = &self.attributes;
        [
            (ManualField::Year, &a.year),
            (ManualField::Make, &a.make),
            (ManualField::Model, &a.model),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    /// Has a VIN and everything pricing needs
    pub fn is_captured(&self) -> bool {
        self.vin.is_some() && self.missing_field().is_none()
    }

    /// Merge a decode result. Primary fields keep their previous value when
    /// the service returned nothing; display-only fields are replaced.
    pub fn apply_decoded(&mut self, vin: String, decoded: VehicleAttributes) {
        fn keep(current: &mut String, incoming: String) {
            if !incoming.trim().is_empty() {
                *current = incoming;
            }
        }

        self.vin = Some(vin);
        let a = &mut self.attributes;
        let VehicleAttributes {
            year,
            make,
            model,
            body_class,
            fuel_type,
            engine_hp,
            drive_type,
            ..
        } = decoded.clone();
        keep(&mut a.year, year);
        keep(&mut a.make, make);
        keep(&mut a.model, model);
        keep(&mut a.body_class, body_class);
        keep(&mut a.fuel_type, fuel_type);
        keep(&mut a.engine_hp, engine_hp);
        keep(&mut a.drive_type, drive_type);

        a.vehicle_type = decoded.vehicle_type;
        a.engine_cylinders = decoded.engine_cylinders;
        a.displacement_l = decoded.displacement_l;
        a.transmission_style = decoded.transmission_style;
        a.transmission_speeds = decoded.transmission_speeds;
        a.doors = decoded.doors;
        a.seats = decoded.seats;
        a.gvwr = decoded.gvwr;
        a.series = decoded.series;
        a.trim = decoded.trim;
        a.plant_country = decoded.plant_country;
        a.plant_city = decoded.plant_city;
    }

    /// "• Vehículo 1: 2023 TOYOTA Corolla — Sedan/Saloon (Gasoline · 169 HP · 4 puertas)"
    pub fn summary_line(&self, index: usize) -> String {
        let a = &self.attributes;
        let mut parts = Vec::new();

        let title = [a.year.trim(), a.make.trim(), a.model.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if !title.is_empty() {
            parts.push(title);
        }
        if !a.body_class.trim().is_empty() {
            parts.push(a.body_class.trim().to_string());
        }

        let mut extra = Vec::new();
        if !a.fuel_type.trim().is_empty() {
            extra.push(a.fuel_type.trim().to_string());
        }
        if !a.engine_hp.trim().is_empty() {
            extra.push(format!("{} HP", a.engine_hp.trim()));
        }
        if !a.doors.trim().is_empty() {
            extra.push(format!("{} puertas", a.doors.trim()));
        }
        let extra = if extra.is_empty() {
            String::new()
        } else {
            format!(" ({})", extra.join(" · "))
        };

        format!("• Vehículo {}: {}{}", index + 1, parts.join(" — "), extra)
    }
}

impl VehicleLike for Vehicle {
    fn make(&self) -> Option<&str> {
        self.attributes.make()
    }
    fn model(&self) -> Option<&str> {
        self.attributes.model()
    }
    fn body_class(&self) -> Option<&str> {
        self.attributes.body_class()
    }
    fn year(&self) -> Option<&str> {
        self.attributes.year()
    }
    fn engine_hp(&self) -> Option<&str> {
        self.attributes.engine_hp()
    }
    fn drive_type(&self) -> Option<&str> {
        self.attributes.drive_type()
    }
}

/// Everything collected during one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub document_number: Option<String>,
    pub insurance_type: Option<PolicyKind>,
    pub vehicles: Vec<Vehicle>,
    /// Index into `vehicles`, or `vehicles.len()` once every vehicle is captured
    pub current_vehicle_index: usize,
    pub current_step: Step,
    pub quote_amount: Option<f64>,
    pub manual_field: Option<ManualField>,
    pub last_decoded_index: Option<usize>,
    pub selected_policy: Option<PolicyKind>,
    pub lead_submitted: bool,
}

impl Default for UserData {
    fn default() -> Self {
        Self {
            name: None,
            email: None,
            phone: None,
            birth_date: None,
            address: None,
            document_number: None,
            insurance_type: None,
            vehicles: vec![Vehicle::default()],
            current_vehicle_index: 0,
            current_step: Step::Welcome,
            quote_amount: None,
            manual_field: None,
            last_decoded_index: None,
            selected_policy: None,
            lead_submitted: false,
        }
    }
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the vehicle list with `count` empty slots
    pub fn reset_vehicles(&mut self, count: usize) {
        self.vehicles = vec![Vehicle::default(); count];
        self.current_vehicle_index = 0;
        self.last_decoded_index = None;
        self.manual_field = None;
        self.quote_amount = None;
    }

    /// First vehicle that is not fully captured yet
    pub fn next_incomplete_vehicle(&self) -> Option<usize> {
        self.vehicles.iter().position(|v| !v.is_captured())
    }

    /// Current vehicle index clamped into the list
    pub fn vehicle_index(&self) -> usize {
        self.current_vehicle_index
            .min(self.vehicles.len().saturating_sub(1))
    }
}
