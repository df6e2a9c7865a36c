use crate::adapters::{ensure_success, http_client};
use crate::config::toml_config::GeocoderConfig;
use crate::domain::model::{GeocodeOutcome, GeocodeResult};
use crate::domain::ports::Geocoder;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SERVICE: &str = "mapbox";

#[derive(Debug, Deserialize)]
struct ForwardResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[longitude, latitude]`
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    full_address: Option<String>,
    match_code: Option<MatchCode>,
    #[serde(default)]
    context: Context,
}

#[derive(Debug, Deserialize)]
struct MatchCode {
    confidence: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Context {
    region: Option<RegionContext>,
    postcode: Option<NamedContext>,
    district: Option<NamedContext>,
    place: Option<NamedContext>,
    neighborhood: Option<NamedContext>,
    street: Option<NamedContext>,
    address: Option<AddressContext>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegionContext {
    region_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressContext {
    address_number: Option<String>,
}

fn name_of(context: Option<NamedContext>) -> Option<String> {
    context.and_then(|c| c.name)
}

impl Feature {
    fn into_outcome(self) -> Result<GeocodeOutcome> {
        let confidence = match self.properties.match_code.and_then(|m| m.confidence) {
            Some(confidence) if !confidence.is_empty() => confidence,
            _ => return Ok(GeocodeOutcome::NotFound("Address not found".to_string())),
        };

        let (longitude, latitude) = match self.geometry.coordinates.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => {
                return Err(EtlError::GeocodeError {
                    provider: SERVICE.to_string(),
                    message: "feature geometry has no coordinates".to_string(),
                })
            }
        };

        let context = self.properties.context;
        Ok(GeocodeOutcome::Found(GeocodeResult {
            full_address: self.properties.full_address,
            latitude,
            longitude,
            confidence: Some(confidence),
            region: context.region.and_then(|r| r.region_code),
            postcode: name_of(context.postcode),
            district: name_of(context.district),
            city: name_of(context.place),
            neighborhood: name_of(context.neighborhood),
            street: name_of(context.street),
            street_number: context.address.and_then(|a| a.address_number),
            county: None,
        }))
    }
}

/// Mapbox Geocoding v6 forward search, biased towards `proximity`.
pub struct MapboxGeocoder {
    client: Client,
    endpoint: String,
    access_token: String,
    proximity: Option<String>,
}

impl MapboxGeocoder {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
        proximity: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
            proximity,
        })
    }

    pub fn from_config(config: &GeocoderConfig) -> Result<Self> {
        let token = config
            .mapbox_token
            .clone()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "geocoder.mapbox_token (MAPBOX_ACCESS_TOKEN)".to_string(),
            })?;
        Self::new(
            config.mapbox_endpoint.clone(),
            token,
            config.proximity.clone(),
            config.timeout_seconds,
        )
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    fn provider(&self) -> &'static str {
        SERVICE
    }

    async fn forward(&self, address: &str) -> Result<GeocodeOutcome> {
        tracing::debug!("Geocoding address with Mapbox: {}", address);

        let mut query = vec![
            ("q", address),
            ("access_token", self.access_token.as_str()),
            ("limit", "1"),
            ("language", "en"),
            ("autocomplete", "true"),
        ];
        if let Some(proximity) = &self.proximity {
            query.push(("proximity", proximity.as_str()));
        }

        let response = self.client.get(&self.endpoint).query(&query).send().await?;
        let response = ensure_success(SERVICE, response).await?;
        let body: ForwardResponse = response.json().await?;

        match body.features.into_iter().next() {
            Some(feature) => feature.into_outcome(),
            None => Ok(GeocodeOutcome::NotFound("No match found".to_string())),
        }
    }
}
