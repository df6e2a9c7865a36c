//! Cleaning of raw ClinicHQ appointment objects into [`ClinicRecord`]s.

use crate::domain::model::{Appointment, Cat, ClinicRecord, DirtyRecord, Owner};
use crate::utils::error::{EtlError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

pub type RawRecord = Map<String, Value>;

const REQUIRED_ADDRESS_FIELDS: [&str; 4] = [
    "ownerAddressLine1",
    "ownerCity",
    "ownerState",
    "ownerZip",
];

pub fn checkout_status(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("Pending"),
        2 => Some("In Progress"),
        3 => Some("Checked Out"),
        4 => Some("Canceled"),
        5 => Some("No Show"),
        _ => None,
    }
}

pub fn appointment_type(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("Spay Or Neuter"),
        2 => Some("Recheck"),
        3 => Some("Wellness"),
        _ => None,
    }
}

/// Accepts a JSON list, a single object, or a JSON string holding either.
pub fn parse_raw_payload(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let mut value: Value = serde_json::from_slice(bytes)?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)?;
    }

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(EtlError::ProcessingError {
                message: format!("expected an appointment object, found {}", other),
            }),
        })
        .collect()
}

/// ClinicHQ dates look like `2023-05-14T09:30:00`, sometimes with fractional
/// seconds or a zone suffix.
pub fn parse_record_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

/// Age recorded at `record_date` plus the whole months elapsed until `today`.
pub fn current_age(record_date: NaiveDate, today: NaiveDate, years: u32, months: u32) -> (u32, u32) {
    let mut elapsed = (today.year() as i64 - record_date.year() as i64) * 12
        + (today.month() as i64 - record_date.month() as i64);
    if today.day() < record_date.day() {
        elapsed -= 1;
    }

    let total = (elapsed + years as i64 * 12 + months as i64).max(0);
    ((total / 12) as u32, (total % 12) as u32)
}

/// Non-empty text of a field. Numbers are rendered, everything else is absent.
fn text(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(raw: &RawRecord, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn dirty(raw: RawRecord, reason: impl Into<String>) -> DirtyRecord {
    DirtyRecord {
        raw,
        reason: reason.into(),
    }
}

/// Either a clean record or the raw object with the reason it was rejected.
pub fn clean_record(raw: RawRecord, today: NaiveDate) -> std::result::Result<ClinicRecord, DirtyRecord> {
    let Some(date) = text(&raw, "date") else {
        return Err(dirty(raw, "Missing record date"));
    };
    let Some(record_date) = parse_record_date(&date) else {
        return Err(dirty(raw, format!("Invalid record date: {}", date)));
    };

    let microchip_text = text(&raw, "microchipNumber").map(|m| m.trim().to_string());
    let Some((microchip_text, microchip)) = microchip_text
        .and_then(|m| m.parse::<u64>().ok().map(|n| (m, n)))
    else {
        return Err(dirty(raw, "Missing or invalid microchip"));
    };

    let missing: Vec<&str> = REQUIRED_ADDRESS_FIELDS
        .iter()
        .copied()
        .filter(|field| text(&raw, field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(dirty(
            raw,
            format!("Missing address fields: {}", missing.join(", ")),
        ));
    }

    let appointment_code = integer(&raw, "appointmentType");
    let Some(appointment_label) = appointment_code.and_then(appointment_type) else {
        let reason = format!(
            "Unknown appointment type: {}",
            raw.get("appointmentType").unwrap_or(&Value::Null)
        );
        return Err(dirty(raw, reason));
    };
    let Some(checkout_label) = integer(&raw, "checkoutStatus").and_then(checkout_status) else {
        let reason = format!(
            "Unknown checkout status: {}",
            raw.get("checkoutStatus").unwrap_or(&Value::Null)
        );
        return Err(dirty(raw, reason));
    };

    let age_years = integer(&raw, "ageYears").unwrap_or(0).max(0) as u32;
    let age_months = integer(&raw, "ageMonths").unwrap_or(0).max(0) as u32;
    let (age_years, age_months) = current_age(record_date, today, age_years, age_months);

    let full_address = [
        "ownerAddressLine1",
        "ownerAddressLine2",
        "ownerCity",
        "ownerState",
        "ownerZip",
    ]
    .iter()
    .filter_map(|field| text(&raw, field))
    .collect::<Vec<_>>()
    .join(", ");

    let cat_name = text(&raw, "animalName")
        .unwrap_or_default()
        .replace(&microchip_text, "")
        .trim()
        .to_string();

    let cat = Cat {
        microchip,
        sex: text(&raw, "sex").unwrap_or_default(),
        cat_name,
        age_years,
        age_months,
        breed: text(&raw, "breed").unwrap_or_default(),
        primary_color: text(&raw, "primaryColor").unwrap_or_default(),
        secondary_color: text(&raw, "secondaryColor"),
        spayed_neutered: integer(&raw, "spayedNeutered") == Some(1),
        full_address: full_address.clone(),
        last_updated: date.clone(),
    };
    let owner = Owner {
        owner_first_name: text(&raw, "ownerFirstName").unwrap_or_default(),
        owner_last_name: text(&raw, "ownerLastName").unwrap_or_default(),
        owner_cell_phone: text(&raw, "ownerCellPhone"),
        owner_home_phone: text(&raw, "ownerHomePhone"),
        owner_address: full_address,
        last_updated: date.clone(),
    };
    let appointment = Appointment {
        microchip,
        appointment_type: appointment_label.to_string(),
        checkout_status: checkout_label.to_string(),
        date,
    };

    Ok(ClinicRecord {
        cat,
        owner,
        appointment,
    })
}
