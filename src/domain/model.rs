use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub microchip: u64,
    pub sex: String,
    pub cat_name: String,
    pub age_years: u32,
    pub age_months: u32,
    pub breed: String,
    pub primary_color: String,
    pub secondary_color: Option<String>,
    pub spayed_neutered: bool,
    pub full_address: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub owner_cell_phone: Option<String>,
    pub owner_home_phone: Option<String>,
    pub owner_address: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub microchip: u64,
    pub appointment_type: String,
    pub checkout_status: String,
    pub date: String,
}

/// One cleaned ClinicHQ appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicRecord {
    pub cat: Cat,
    pub owner: Owner,
    pub appointment: Appointment,
}

/// `{"records": [...]}` wrapper shared by the record files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsFile<T> {
    pub records: Vec<T>,
}

impl<T> RecordsFile<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self { records }
    }
}

impl<T> Default for RecordsFile<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

/// `processed_cat_data.json`
pub type ProcessedData = RecordsFile<ClinicRecord>;

/// A raw appointment rejected during processing, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirtyRecord {
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
    pub reason: String,
}

/// `dirty_cats.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirtyData {
    pub dirty_cats: Vec<DirtyRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub records: Vec<ClinicRecord>,
    pub dirty: Vec<DirtyRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub full_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

/// A provider answered. Transport and HTTP failures are errors instead.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Found(GeocodeResult),
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    Address(String),
    Coordinates { latitude: f64, longitude: f64 },
}

impl CacheKey {
    /// Stable string form, used by backends that key on text.
    pub fn cache_id(&self) -> String {
        match self {
            CacheKey::Address(address) => address.clone(),
            CacheKey::Coordinates {
                latitude,
                longitude,
            } => format!("{:.7},{:.7}", latitude, longitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: Option<GeocodeResult>,
    pub error: Option<String>,
}

impl CacheEntry {
    pub fn success(result: GeocodeResult) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedRecord {
    pub cat: Cat,
    pub owner: Owner,
    pub appointment: Appointment,
    pub cat_location: GeocodeResult,
    pub owner_location: GeocodeResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub cat: Cat,
    pub owner: Owner,
    pub appointment: Appointment,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressAuditRow {
    pub original_address: String,
    pub geocoded_address: String,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub cell_phone: String,
    pub home_phone: String,
}

#[derive(Debug, Clone, Default)]
pub struct GeocodeOutput {
    pub geocoded: Vec<GeocodedRecord>,
    pub failed: Vec<FailedRecord>,
    pub audit: Vec<AddressAuditRow>,
}

/// An input row of the reverse geocoding job. Unknown fields pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Location {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLocation {
    #[serde(flatten)]
    pub location: Location,
    pub address: GeocodeResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LookupStatus {
    Cached,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseAuditRow {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: LookupStatus,
    pub reason: Option<String>,
    pub full_address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReverseOutput {
    pub enriched: Vec<EnrichedLocation>,
    pub audit: Vec<ReverseAuditRow>,
}
