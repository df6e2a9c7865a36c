use crate::adapters::{ensure_success, http_client};
use crate::config::toml_config::GeocoderConfig;
use crate::domain::model::{GeocodeOutcome, GeocodeResult};
use crate::domain::ports::{Geocoder, ReverseGeocoder};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const SERVICE: &str = "google";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeEntry>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    formatted_address: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeEntry {
    fn into_result(self) -> GeocodeResult {
        // Components are indexed by their primary type; a later component of
        // the same type replaces an earlier one.
        let components: HashMap<String, AddressComponent> = self
            .address_components
            .into_iter()
            .filter_map(|c| c.types.first().cloned().map(|t| (t, c)))
            .collect();
        let long = |kind: &str| components.get(kind).map(|c| c.long_name.clone());

        GeocodeResult {
            full_address: self.formatted_address,
            latitude: self.geometry.location.lat,
            longitude: self.geometry.location.lng,
            region: long("administrative_area_level_1"),
            county: long("administrative_area_level_2"),
            postcode: long("postal_code"),
            city: long("locality"),
            street: components.get("route").map(|c| c.short_name.clone()),
            street_number: long("street_number"),
            ..Default::default()
        }
    }
}

impl GeocodeResponse {
    fn into_outcome(self) -> Result<GeocodeOutcome> {
        match self.status.as_str() {
            "OK" => match self.results.into_iter().next() {
                Some(entry) => Ok(GeocodeOutcome::Found(entry.into_result())),
                None => Ok(GeocodeOutcome::NotFound("No match found".to_string())),
            },
            "ZERO_RESULTS" => Ok(GeocodeOutcome::NotFound("No match found".to_string())),
            status => Err(EtlError::GeocodeError {
                provider: SERVICE.to_string(),
                message: match self.error_message {
                    Some(message) => format!("{}: {}", status, message),
                    None => status.to_string(),
                },
            }),
        }
    }
}

/// Google Maps Geocoding API, forward and reverse.
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
    components: Option<String>,
}

impl GoogleGeocoder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        components: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            components,
        })
    }

    pub fn from_config(config: &GeocoderConfig) -> Result<Self> {
        let api_key =
            config
                .google_api_key
                .clone()
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "geocoder.google_api_key (GOOGLE_MAPS_API_KEY)".to_string(),
                })?;
        Self::new(
            config.google_endpoint.clone(),
            api_key,
            config.google_components.clone(),
            config.timeout_seconds,
        )
    }

    async fn request(&self, query: &[(&str, &str)]) -> Result<GeocodeOutcome> {
        let mut params = vec![
            ("key", self.api_key.as_str()),
            ("language", "en"),
            ("region", "us"),
        ];
        params.extend_from_slice(query);

        let response = self.client.get(&self.endpoint).query(&params).send().await?;
        let response = ensure_success(SERVICE, response).await?;
        let body: GeocodeResponse = response.json().await?;
        body.into_outcome()
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    fn provider(&self) -> &'static str {
        SERVICE
    }

    async fn forward(&self, address: &str) -> Result<GeocodeOutcome> {
        tracing::debug!("Geocoding address with Google Maps: {}", address);
        match &self.components {
            Some(components) => {
                self.request(&[("address", address), ("components", components.as_str())])
                    .await
            }
            None => self.request(&[("address", address)]).await,
        }
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<GeocodeOutcome> {
        tracing::debug!("Reverse geocoding coordinates: {}, {}", latitude, longitude);
        let latlng = format!("{},{}", latitude, longitude);
        self.request(&[("latlng", latlng.as_str())]).await
    }
}
