//! Static rate configuration
//!
//! Read-only pricing data shared by the chat flow and the quote form. Amounts
//! are monthly rates in USD.

use serde::Serialize;

/// Canonical body-class categories the rate table is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BodyClass {
    Sedan,
    Hatchback,
    Wagon,
    Coupe,
    Convertible,
    Suv,
    Crossover,
    Pickup,
    Van,
    Minivan,
    Truck,
    Other,
}

impl BodyClass {
    /// Canonicalize a free-form body class string from the vehicle data service.
    ///
    /// Minivan is checked before the generic van match.
    pub fn canonicalize(raw: &str) -> Self {
        let s = raw.trim().to_lowercase();
        if s.is_empty() {
            return BodyClass::Other;
        }

        if s.contains("minivan") || s.contains("mini-van") {
            return BodyClass::Minivan;
        }
        if s.contains("van") {
            return BodyClass::Van;
        }

        if s.contains("crossover") {
            return BodyClass::Crossover;
        }
        if s.contains("suv") || s.contains("sport utility") {
            return BodyClass::Suv;
        }

        if s.contains("pickup") || s.contains("pick-up") {
            return BodyClass::Pickup;
        }
        if s.contains("truck") {
            return BodyClass::Truck;
        }

        if s.contains("sedan") || s.contains("saloon") {
            return BodyClass::Sedan;
        }
        if s.contains("hatchback") {
            return BodyClass::Hatchback;
        }
        if s.contains("wagon") || s.contains("estate") {
            return BodyClass::Wagon;
        }
        if s.contains("coupe") {
            return BodyClass::Coupe;
        }
        if ["convertible", "cabriolet", "roadster", "spider"]
            .iter()
            .any(|k| s.contains(k))
        {
            return BodyClass::Convertible;
        }

        BodyClass::Other
    }

    pub fn label(self) -> &'static str {
        match self {
            BodyClass::Sedan => "Sedan/Saloon",
            BodyClass::Hatchback => "Hatchback",
            BodyClass::Wagon => "Wagon",
            BodyClass::Coupe => "Coupe",
            BodyClass::Convertible => "Convertible",
            BodyClass::Suv => "Sport Utility Vehicle (SUV)",
            BodyClass::Crossover => "Crossover",
            BodyClass::Pickup => "Pickup",
            BodyClass::Van => "Van",
            BodyClass::Minivan => "Minivan",
            BodyClass::Truck => "Truck",
            BodyClass::Other => "Other",
        }
    }

    pub fn base_rate(self) -> f64 {
        match self {
            BodyClass::Sedan => 67.0,
            BodyClass::Hatchback => 59.0,
            BodyClass::Wagon => 63.0,
            BodyClass::Coupe => 69.0,
            BodyClass::Convertible => 77.0,
            BodyClass::Suv => 73.0,
            BodyClass::Crossover => 67.0,
            BodyClass::Pickup => 79.0,
            BodyClass::Van => 67.0,
            BodyClass::Minivan => 63.0,
            BodyClass::Truck => 79.0,
            BodyClass::Other => 69.0,
        }
    }
}

/// A flat base rate for a named make and model family
#[derive(Debug, Clone, Copy)]
pub struct ModelOverride {
    pub make: &'static str,
    pub model_keywords: &'static [&'static str],
    pub base: f64,
}

impl ModelOverride {
    /// Both arguments must already be lowercase
    pub fn matches(&self, make: &str, model: &str) -> bool {
        make.contains(self.make) && self.model_keywords.iter().any(|k| model.contains(k))
    }
}

const fn rule(make: &'static str, model_keywords: &'static [&'static str], base: f64) -> ModelOverride {
    ModelOverride {
        make,
        model_keywords,
        base,
    }
}

/// Checked in order, first match wins
pub const MODEL_OVERRIDES: &[ModelOverride] = &[
    // Economy and popular
    rule("toyota", &["corolla", "camry", "prius", "yaris", "avanza"], 65.0),
    rule("honda", &["civic", "fit", "hr-v", "city"], 65.0),
    rule("nissan", &["versa", "sentra", "kicks"], 62.0),
    rule("hyundai", &["accent", "elantra", "venue"], 60.0),
    rule("kia", &["rio", "forte", "seltos"], 60.0),
    // Hybrids
    rule("toyota", &["prius", "rav4 hybrid", "camry hybrid", "corolla hybrid"], 65.0),
    rule("honda", &["insight", "accord hybrid", "cr-v hybrid"], 68.0),
    // SUVs
    rule("toyota", &["rav4", "highlander", "fortuner"], 75.0),
    rule("honda", &["cr-v", "pilot", "passport"], 75.0),
    rule("nissan", &["rogue", "xtrail", "xtrail hybrid"], 72.0),
    rule("mazda", &["cx-5", "cx-30", "cx-9"], 70.0),
    // Exotic
    rule("porsche", &["911", "taycan", "panamera"], 349.0),
    rule("ferrari", &["f8", "roma", "sf90", "purosangue"], 599.0),
    rule("lamborghini", &["huracan", "urus", "aventador"], 699.0),
    rule("bentley", &["bentayga", "flying spur", "continental"], 549.0),
    rule("rolls-royce", &["ghost", "phantom", "cullinan"], 999.0),
    rule("mclaren", &["720s", "gt", "artura"], 799.0),
    rule("aston martin", &["dbx", "vantage", "dbs"], 499.0),
    // Executive luxury
    rule("mercedes", &["s-class", "e-class", "gle", "g-wagon", "amg"], 299.0),
    rule("bmw", &["7", "5", "x5", "x7", "m"], 279.0),
    rule("audi", &["a8", "a7", "a6", "q7", "q8", "rs", "s"], 269.0),
    rule("lexus", &["ls", "lx", "gx", "lc"], 249.0),
    // Premium
    rule("mercedes", &["c-class", "glc", "gla", "a-class"], 219.0),
    rule("bmw", &["3", "4", "x1", "x3", "x4"], 209.0),
    rule("audi", &["a3", "a4", "a5", "q3", "q5"], 199.0),
    rule("lexus", &["is", "es", "nx", "rx", "ux"], 189.0),
    rule("acura", &["tlx", "rdx", "mdx", "integra"], 179.0),
    rule("infiniti", &["q50", "q60", "qx50", "qx60"], 175.0),
    // Premium electric
    rule("porsche", &["taycan"], 349.0),
    rule("audi", &["e-tron gt", "rs e-tron"], 329.0),
    rule("mercedes", &["eqs", "eqe", "eqs suv"], 319.0),
    rule("bmw", &["i7", "ix"], 309.0),
    rule("lucid", &["air"], 349.0),
    rule("rivian", &["r1t", "r1s"], 299.0),
    // Tesla
    rule("tesla", &["model s", "model x"], 297.0),
    rule("tesla", &["cybertruck"], 247.0),
    rule("tesla", &["model 3", "model y"], 197.0),
    // Standard premium electric
    rule("audi", &["q4 e-tron", "q8 e-tron"], 229.0),
    rule("bmw", &["i4", "ix3"], 219.0),
    rule("volvo", &["ex90", "ex30"], 209.0),
    rule("cadillac", &["lyriq"], 219.0),
    // Standard electric
    rule("ford", &["mustang mach-e", "f-150 lightning"], 187.0),
    rule("volkswagen", &["id.4", "id.buzz"], 177.0),
    rule("hyundai", &["ioniq 5", "ioniq 6", "kona electric"], 167.0),
    rule("kia", &["ev6", "ev9", "niro ev"], 167.0),
    // Entry electric and others
    rule("nissan", &["leaf", "ariya"], 147.0),
    rule("chevrolet", &["bolt", "blazer ev", "equinox ev"], 147.0),
    rule("volkswagen", &["id.3"], 157.0),
    rule("mini", &["cooper se"], 167.0),
    rule("mitsubishi", &["mirage", "outlander", "eclipse cross"], 84.0),
    rule("suzuki", &["swift", "sx4", "grand vitara"], 79.0),
];

/// Makes whose presence in a fleet halves the multi-vehicle discount
pub const LUXURY_MAKES: &[&str] = &[
    "tesla",
    "porsche",
    "ferrari",
    "lamborghini",
    "bentley",
    "rolls-royce",
    "mclaren",
    "aston martin",
    "mercedes",
    "bmw",
    "audi",
];

/// Per-vehicle estimate above which a fleet counts as luxury
pub const LUXURY_PRICE_THRESHOLD: f64 = 300.0;

/// Minimum average monthly price per vehicle after discount
pub const MIN_AVERAGE_PER_VEHICLE: f64 = 40.0;

pub const INCREMENTAL_DISCOUNT_PER_VEHICLE: f64 = 0.01;
pub const MAX_DISCOUNT: f64 = 0.30;
pub const MAX_DISCOUNT_LUXURY: f64 = 0.25;

/// Base multi-vehicle discount by fleet size
pub fn base_discount(count: usize) -> f64 {
    match count {
        0 => 0.0,
        1 => 0.05,
        2 => 0.08,
        3 => 0.12,
        4 => 0.15,
        _ => 0.18,
    }
}

pub fn year_multiplier(year: Option<i64>) -> f64 {
    match year {
        None | Some(0) => 1.0,
        Some(y) if y >= 2023 => 1.00,
        Some(y) if y >= 2020 => 0.98,
        Some(y) if y >= 2018 => 0.95,
        Some(y) if y >= 2015 => 0.92,
        Some(_) => 0.90,
    }
}

pub fn horsepower_multiplier(hp: Option<i64>) -> f64 {
    match hp {
        Some(n) if n >= 400 => 1.05,
        Some(n) if n >= 300 => 1.02,
        _ => 1.0,
    }
}

pub fn drivetrain_multiplier(drive_type: &str) -> f64 {
    let t = drive_type.to_lowercase();
    if ["awd", "4wd", "4x4", "all"].iter().any(|k| t.contains(k)) {
        1.01
    } else {
        1.0
    }
}

/// First matching keyword wins
pub fn model_keyword_multiplier(model: &str) -> f64 {
    let m = model.to_lowercase();
    if m.contains("turbo") {
        1.03
    } else if m.contains("hybrid") {
        1.01
    } else if m.contains("sport") {
        1.02
    } else {
        1.0
    }
}
