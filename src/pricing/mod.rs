//! Pricing engine
//!
//! Deterministic, non-binding monthly estimates. Per-vehicle prices come from
//! a body-class base rate (or a make/model override) scaled by year,
//! horsepower, drivetrain and model-keyword adjusters, then rounded to the
//! nearest $5. Fleet totals apply a multi-vehicle discount with a luxury cap
//! and a per-vehicle floor.

pub mod rates;

use serde::Serialize;

pub use rates::BodyClass;
use rates::*;

/// The vehicle attributes pricing reads.
///
/// Implemented by both the chat flow's vehicle records and raw decoded
/// attributes so the quote form can price without building chat state.
pub trait VehicleLike {
    fn make(&self) -> Option<&str>;
    fn model(&self) -> Option<&str>;
    fn body_class(&self) -> Option<&str>;
    fn year(&self) -> Option<&str>;
    fn engine_hp(&self) -> Option<&str>;
    fn drive_type(&self) -> Option<&str>;
}

/// Breakdown of a fleet estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetQuote {
    pub per_vehicle: Vec<u32>,
    pub subtotal: f64,
    pub discount: f64,
    pub luxury: bool,
    pub total: f64,
}

/// Round to the nearest multiple of 5
pub fn round5(x: f64) -> f64 {
    (x / 5.0).round() * 5.0
}

fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Parse the leading integer of a string, ignoring trailing text (`"295.5"` is 295)
pub(crate) fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

pub fn canonical_body_class(raw: Option<&str>) -> BodyClass {
    BodyClass::canonicalize(raw.unwrap_or(""))
}

/// Base rate before adjusters: a matching override replaces the body-class rate
fn base_rate<V: VehicleLike + ?Sized>(vehicle: &V) -> f64 {
    let make = vehicle.make().unwrap_or("").to_lowercase();
    let model = vehicle.model().unwrap_or("").to_lowercase();

    if let Some(rule) = MODEL_OVERRIDES.iter().find(|o| o.matches(&make, &model)) {
        return rule.base;
    }

    canonical_body_class(vehicle.body_class()).base_rate()
}

/// Monthly estimate for one vehicle, always a multiple of 5
pub fn estimate_vehicle_price<V: VehicleLike + ?Sized>(vehicle: &V) -> u32 {
    let year = vehicle.year().and_then(leading_int);
    let hp = vehicle.engine_hp().and_then(leading_int);

    let price = base_rate(vehicle)
        * year_multiplier(year)
        * horsepower_multiplier(hp)
        * drivetrain_multiplier(vehicle.drive_type().unwrap_or(""))
        * model_keyword_multiplier(vehicle.model().unwrap_or(""));

    round5(price).max(0.0) as u32
}

fn is_luxury_make(make: &str) -> bool {
    let make = make.to_lowercase();
    LUXURY_MAKES.iter().any(|brand| make.contains(brand))
}

/// Full fleet breakdown
pub fn quote_fleet<V: VehicleLike>(vehicles: &[V]) -> FleetQuote {
    let count = vehicles.len();
    if count == 0 {
        return FleetQuote {
            per_vehicle: Vec::new(),
            subtotal: 0.0,
            discount: 0.0,
            luxury: false,
            total: 0.0,
        };
    }

    let per_vehicle: Vec<u32> = vehicles.iter().map(|v| estimate_vehicle_price(v)).collect();
    let subtotal: f64 = per_vehicle.iter().map(|&p| f64::from(p)).sum();

    let luxury = vehicles
        .iter()
        .any(|v| v.make().map(is_luxury_make).unwrap_or(false))
        || per_vehicle
            .iter()
            .any(|&p| f64::from(p) > LUXURY_PRICE_THRESHOLD);

    let mut discount = base_discount(count);
    let cap = if luxury {
        discount *= 0.5;
        MAX_DISCOUNT_LUXURY
    } else {
        MAX_DISCOUNT
    };

    let additional = ((count - 1) as f64 * INCREMENTAL_DISCOUNT_PER_VEHICLE).min(cap - discount);
    discount = (discount + additional).min(cap);

    // Keep the discounted average at or above the floor.
    let n = count as f64;
    if subtotal > 0.0 && subtotal * (1.0 - discount) / n < MIN_AVERAGE_PER_VEHICLE {
        discount = (1.0 - MIN_AVERAGE_PER_VEHICLE * n / subtotal).clamp(0.0, cap);
    }

    FleetQuote {
        per_vehicle,
        subtotal,
        discount,
        luxury,
        total: round_cents(subtotal * (1.0 - discount)),
    }
}

/// Discounted monthly total for a fleet, rounded to cents
pub fn estimate_fleet_price<V: VehicleLike>(vehicles: &[V]) -> f64 {
    quote_fleet(vehicles).total
}

/// Format an amount as US currency, e.g. `$1,234.50`
pub fn format_usd(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let negative = cents < 0;
    let cents = cents.abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!(
        "{}${}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        cents % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Default)]
    struct Car {
        make: Option<String>,
        model: Option<String>,
        body_class: Option<String>,
        year: Option<String>,
        engine_hp: Option<String>,
        drive_type: Option<String>,
    }

    impl Car {
        fn new(make: &str, model: &str, body: &str, year: &str) -> Self {
            Self {
                make: Some(make.into()),
                model: Some(model.into()),
                body_class: Some(body.into()),
                year: Some(year.into()),
                ..Default::default()
            }
        }
    }

    impl VehicleLike for Car {
        fn make(&self) -> Option<&str> {
            self.make.as_deref()
        }
        fn model(&self) -> Option<&str> {
            self.model.as_deref()
        }
        fn body_class(&self) -> Option<&str> {
            self.body_class.as_deref()
        }
        fn year(&self) -> Option<&str> {
            self.year.as_deref()
        }
        fn engine_hp(&self) -> Option<&str> {
            self.engine_hp.as_deref()
        }
        fn drive_type(&self) -> Option<&str> {
            self.drive_type.as_deref()
        }
    }

    #[test]
    fn test_round5() {
        assert_eq!(round5(63.0), 65.0);
        assert_eq!(round5(62.4), 60.0);
        assert_eq!(round5(67.5), 70.0);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("2023"), Some(2023));
        assert_eq!(leading_int(" 295.5 "), Some(295));
        assert_eq!(leading_int("3 vehículos"), Some(3));
        assert_eq!(leading_int("tres"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn test_body_class_rate_for_minivan() {
        let odyssey = Car::new("Honda", "Odyssey", "Minivan", "2023");
        assert_eq!(estimate_vehicle_price(&odyssey), 65);
    }

    #[test]
    fn test_override_replaces_base_rate() {
        let corolla = Car::new("TOYOTA", "Corolla", "Sedan/Saloon", "2023");
        assert_eq!(estimate_vehicle_price(&corolla), 65);

        // Adjusters still apply on top of an override: 65 * 0.90 = 58.5 -> 60
        let old = Car::new("TOYOTA", "Corolla", "Sedan/Saloon", "2010");
        assert_eq!(estimate_vehicle_price(&old), 60);
    }

    #[test]
    fn test_adjusters_stack() {
        let mut car = Car::new("Ford", "Explorer Sport", "SUV", "2021");
        car.engine_hp = Some("365".into());
        car.drive_type = Some("4WD/4-Wheel Drive/4x4".into());
        // 73 * 0.98 * 1.02 * 1.01 * 1.02 = 75.2 -> 75
        assert_eq!(estimate_vehicle_price(&car), 75);
    }

    #[test]
    fn test_missing_attributes_price_as_other() {
        let unknown = Car::default();
        assert_eq!(estimate_vehicle_price(&unknown), 70);
    }

    #[test]
    fn test_two_corollas_fleet() {
        let fleet = vec![
            Car::new("TOYOTA", "Corolla", "Sedan/Saloon", "2023"),
            Car::new("TOYOTA", "Corolla", "Sedan/Saloon", "2023"),
        ];
        let quote = quote_fleet(&fleet);
        assert_eq!(quote.subtotal, 130.0);
        assert!(!quote.luxury);
        assert!((quote.discount - 0.09).abs() < 1e-9);
        assert_eq!(quote.total, 118.30);
        assert_eq!(estimate_fleet_price(&fleet), 118.30);
    }

    #[test]
    fn test_base_discount_schedule() {
        let schedule: Vec<f64> = (1..=5).map(base_discount).collect();
        assert_eq!(schedule, vec![0.05, 0.08, 0.12, 0.15, 0.18]);
        assert_eq!(base_discount(9), 0.18);
    }

    #[test]
    fn test_corolla_fleets_by_size() {
        let corolla = Car::new("TOYOTA", "Corolla", "Sedan/Saloon", "2023");
        // schedule plus one point per extra vehicle
        for (n, expected) in [(1, 0.05), (2, 0.09), (3, 0.14), (4, 0.18), (5, 0.22)] {
            let quote = quote_fleet(&vec![corolla.clone(); n]);
            assert!(!quote.luxury);
            assert!(
                (quote.discount - expected).abs() < 1e-9,
                "{} vehicles: {}",
                n,
                quote.discount
            );
        }
    }

    #[test]
    fn test_luxury_fleet_halves_discount() {
        let fleet = vec![
            Car::new("BMW", "X5", "SUV", "2023"),
            Car::new("TOYOTA", "Corolla", "Sedan/Saloon", "2023"),
        ];
        let quote = quote_fleet(&fleet);
        assert!(quote.luxury);
        assert_eq!(quote.per_vehicle, vec![280, 65]);
        // 0.08 halved, plus one incremental point
        assert!((quote.discount - 0.05).abs() < 1e-9);
        assert_eq!(quote.total, 327.75);
    }

    #[test]
    fn test_empty_fleet_is_zero() {
        let fleet: Vec<Car> = Vec::new();
        assert_eq!(estimate_fleet_price(&fleet), 0.0);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(118.3), "$118.30");
        assert_eq!(format_usd(65.0), "$65.00");
        assert_eq!(format_usd(1234.5), "$1,234.50");
        assert_eq!(format_usd(1_000_000.0), "$1,000,000.00");
    }

    fn arb_car() -> impl Strategy<Value = Car> {
        let makes = prop::sample::select(vec![
            "Toyota", "Honda", "BMW", "Ferrari", "Kia", "Ford", "Tesla", "",
        ]);
        let models = prop::sample::select(vec![
            "Corolla", "Civic", "X5", "Roma", "Rio", "F-150", "Model 3", "Turbo", "",
        ]);
        let bodies = prop::sample::select(vec![
            "Sedan/Saloon", "Minivan", "Pickup", "Coupe", "Convertible", "Wagon", "",
        ]);
        (makes, models, bodies, 1990u32..2027, 0u32..700, any::<bool>()).prop_map(
            |(make, model, body, year, hp, awd)| Car {
                make: Some(make.to_string()),
                model: Some(model.to_string()),
                body_class: Some(body.to_string()),
                year: Some(year.to_string()),
                engine_hp: Some(hp.to_string()),
                drive_type: Some(if awd { "AWD" } else { "FWD" }.to_string()),
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_vehicle_price_is_multiple_of_five(car in arb_car()) {
            let price = estimate_vehicle_price(&car);
            prop_assert_eq!(price % 5, 0);
            prop_assert!(price > 0);
        }

        #[test]
        fn prop_fleet_total_respects_discount_bounds(fleet in prop::collection::vec(arb_car(), 1..=5)) {
            let quote = quote_fleet(&fleet);
            let cap = if quote.luxury { MAX_DISCOUNT_LUXURY } else { MAX_DISCOUNT };
            prop_assert!(quote.discount >= 0.0);
            prop_assert!(quote.discount <= cap + 1e-9);
            prop_assert!(quote.total <= quote.subtotal);
            prop_assert!(quote.total / fleet.len() as f64 >= MIN_AVERAGE_PER_VEHICLE - 0.01);
        }

        #[test]
        fn prop_discount_non_decreasing_with_fleet_size(car in arb_car()) {
            prop_assume!(!quote_fleet(&[car.clone()]).luxury);
            let discounts: Vec<f64> = (1..=5)
                .map(|n| quote_fleet(&vec![car.clone(); n]).discount)
                .collect();
            for pair in discounts.windows(2) {
                prop_assert!(pair[0] <= pair[1] + 1e-9, "{:?}", discounts);
            }
        }

        #[test]
        fn prop_fleet_total_is_cent_rounded(fleet in prop::collection::vec(arb_car(), 1..=5)) {
            let total = estimate_fleet_price(&fleet);
            prop_assert!(((total * 100.0).round() - total * 100.0).abs() < 1e-6);
        }
    }
}
