//! Field validation for the data-capture steps

use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::pricing::{leading_int, BodyClass};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

// Ten-digit NANP number, optional +1, optional parentheses and separators
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\d{3})[-.\s]?\d{3}[-.\s]?\d{4}$")
        .expect("static phone pattern")
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("static date pattern"));

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("static year pattern"));

pub fn is_valid_email(input: &str) -> bool {
    EMAIL_RE.is_match(input.trim())
}

pub fn is_valid_phone(input: &str) -> bool {
    PHONE_RE.is_match(input.trim())
}

/// `DD/MM/YYYY` naming a real calendar day
pub fn parse_birth_date(input: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(input.trim())?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_valid_birth_date(input: &str) -> bool {
    parse_birth_date(input).is_some()
}

/// Leading integer in `1..=max`; `"3 autos"` counts as 3
pub fn parse_vehicle_count(input: &str, max: usize) -> Option<usize> {
    let count = leading_int(input)?;
    usize::try_from(count)
        .ok()
        .filter(|n| (1..=max).contains(n))
}

/// Four digits from 1900 up to next year
pub fn parse_manual_year(input: &str) -> Option<i32> {
    let input = input.trim();
    if !YEAR_RE.is_match(input) {
        return None;
    }
    let year: i32 = input.parse().ok()?;
    let latest = Utc::now().year() + 1;
    (1900..=latest).contains(&year).then_some(year)
}

/// Spanish or English body type typed by the user, mapped to a canonical label
pub fn normalize_body_type(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let mapped = if lower.contains("minivan") {
        Some(BodyClass::Minivan)
    } else if lower.contains("furgoneta") || lower.contains("van") {
        Some(BodyClass::Van)
    } else if lower.contains("suv") || lower.contains("todoterreno") {
        Some(BodyClass::Suv)
    } else if lower.contains("pickup") || lower.contains("pick-up") || lower.contains("camioneta") {
        Some(BodyClass::Pickup)
    } else if lower.contains("troca") || lower.contains("camión") || lower.contains("camion") {
        Some(BodyClass::Truck)
    } else if lower.contains("sedán") || lower.contains("sedan") {
        Some(BodyClass::Sedan)
    } else if lower.contains("hatch") {
        Some(BodyClass::Hatchback)
    } else if lower.contains("familiar") || lower.contains("wagon") {
        Some(BodyClass::Wagon)
    } else if lower.contains("cupé") || lower.contains("coupe") {
        Some(BodyClass::Coupe)
    } else if lower.contains("convertible") || lower.contains("descapotable") {
        Some(BodyClass::Convertible)
    } else if lower.contains("crossover") {
        Some(BodyClass::Crossover)
    } else {
        None
    };

    match mapped {
        Some(class) => class.label().to_string(),
        None => input.trim().to_string(),
    }
}

/// Yes-like (`Some(true)`), no-like (`Some(false)`) or neither
pub fn affirmation(input: &str) -> Option<bool> {
    let lower = input.trim().to_lowercase();
    let first = lower
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())?;

    match first {
        "si" | "sí" | "claro" | "dale" | "acepto" | "continuar" | "proceder" | "yes" => Some(true),
        "no" | "nop" => Some(false),
        _ => None,
    }
}

/// `+CC (AAA) BBB-CCCC`. A bare 10-digit number gets country code 1.
pub fn format_phone(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let (country, local) = match digits.len() {
        10 => ("1", digits.as_str()),
        11..=13 => digits.split_at(digits.len() - 10),
        _ => return None,
    };
    Some(format!(
        "+{} ({}) {}-{}",
        country,
        &local[..3],
        &local[3..6],
        &local[6..]
    ))
}
