use crate::adapters::{ensure_success, http_client};
use crate::config::toml_config::SupabaseConfig;
use crate::domain::model::{CacheEntry, CacheKey, GeocodeResult};
use crate::domain::ports::GeocodeCache;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SERVICE: &str = "supabase";

/// Minimal PostgREST client for a Supabase project. One instance per run.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    key: String,
    page_size: usize,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            page_size: config.page_size.max(1),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn eq_filters(filters: &[(&str, String)]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|(column, value)| (column.to_string(), format!("eq.{}", value)))
            .collect()
    }

    /// Body decoding errors surface as [`EtlError::SerializationError`]
    /// rather than transport errors.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `select=*` rows where every `column = value`.
    pub async fn select_eq<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .query(&Self::eq_filters(filters));
        let response = self.authorized(request).send().await?;
        let response = ensure_success(SERVICE, response).await?;
        Self::decode(response).await
    }

    /// Every row of `table`, fetched page by page with `limit`/`offset`.
    pub async fn select_all<T: DeserializeOwned>(&self, table: &str, columns: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut offset = 0usize;

        loop {
            let request = self.client.get(self.table_url(table)).query(&[
                ("select", columns.to_string()),
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ]);
            let response = self.authorized(request).send().await?;
            let response = ensure_success(SERVICE, response).await?;
            let page: Vec<T> = Self::decode(response).await?;
            let fetched = page.len();
            // The server may cap rows below `limit`, so only an empty page ends the scan.
            if fetched == 0 {
                break;
            }
            rows.extend(page);

            tracing::debug!("Fetched {} rows from {} (offset {})", fetched, table, offset);
            offset += fetched;
        }

        Ok(rows)
    }

    pub async fn insert(&self, table: &str, row: &Value) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(row);
        let response = self.authorized(request).send().await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    pub async fn update_eq(&self, table: &str, filters: &[(&str, String)], row: &Value) -> Result<()> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&Self::eq_filters(filters))
            .header("Prefer", "return=minimal")
            .json(row);
        let response = self.authorized(request).send().await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    /// Updates the rows matching `filters`, or inserts `row` when none do.
    pub async fn upsert_eq(&self, table: &str, filters: &[(&str, String)], row: &Value) -> Result<()> {
        let existing: Vec<Value> = self.select_eq(table, filters).await?;
        if existing.is_empty() {
            self.insert(table, row).await
        } else {
            self.update_eq(table, filters, row).await
        }
    }
}

/// Row of the forward geocoding cache table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodeCacheRow {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub full_address: Option<String>,
    #[serde(default)]
    pub geocoded_result: Option<GeocodeResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Row of the reverse geocoding cache table; the result is stored flat.
#[derive(Debug, Clone, Default, Deserialize)]
struct ReverseCacheRow {
    latitude: f64,
    longitude: f64,
    full_address: Option<String>,
    state: Option<String>,
    county: Option<String>,
    postcode: Option<String>,
    city: Option<String>,
    street: Option<String>,
    street_number: Option<String>,
    error: Option<String>,
}

impl From<ReverseCacheRow> for CacheEntry {
    fn from(row: ReverseCacheRow) -> Self {
        if let Some(error) = row.error.filter(|e| !e.is_empty()) {
            return CacheEntry::failure(error);
        }
        CacheEntry::success(GeocodeResult {
            full_address: row.full_address,
            latitude: row.latitude,
            longitude: row.longitude,
            region: row.state,
            county: row.county,
            postcode: row.postcode,
            city: row.city,
            street: row.street,
            street_number: row.street_number,
            ..Default::default()
        })
    }
}

/// [`GeocodeCache`] backed by the `geocoding_cache` and
/// `reverse_geocoding_cache` tables.
pub struct SupabaseCache {
    client: SupabaseClient,
    forward_table: String,
    reverse_table: String,
}

impl SupabaseCache {
    pub fn new(client: SupabaseClient, config: &SupabaseConfig) -> Self {
        Self {
            client,
            forward_table: config.geocoding_table.clone(),
            reverse_table: config.reverse_table.clone(),
        }
    }

    pub fn from_config(config: &SupabaseConfig) -> Result<Self> {
        Ok(Self::new(SupabaseClient::new(config)?, config))
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    /// All rows of the forward cache, without the stored result payload.
    pub async fn forward_rows(&self) -> Result<Vec<GeocodeCacheRow>> {
        self.client
            .select_all(&self.forward_table, "address,full_address,error")
            .await
    }

    /// Non-empty `full_address` values of the forward and reverse tables.
    pub async fn full_addresses(&self) -> Result<(Vec<String>, Vec<String>)> {
        let forward = self.full_address_column(&self.forward_table).await?;
        let reverse = self.full_address_column(&self.reverse_table).await?;
        Ok((forward, reverse))
    }

    async fn full_address_column(&self, table: &str) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Row {
            full_address: Option<String>,
        }

        let rows: Vec<Row> = self.client.select_all(table, "full_address").await?;
        tracing::info!("📥 Fetched {} rows from {}", rows.len(), table);
        Ok(rows
            .into_iter()
            .filter_map(|r| r.full_address)
            .filter(|a| !a.trim().is_empty())
            .collect())
    }

    fn coordinate_filters(latitude: f64, longitude: f64) -> [(&'static str, String); 2] {
        [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
        ]
    }
}

fn cache_error(e: EtlError) -> EtlError {
    match e {
        EtlError::SerializationError(source) => EtlError::CacheError {
            message: format!("unreadable cache row: {}", source),
        },
        other => other,
    }
}

#[async_trait]
impl GeocodeCache for SupabaseCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        match key {
            CacheKey::Address(address) => {
                let rows: Vec<GeocodeCacheRow> = self
                    .client
                    .select_eq(&self.forward_table, &[("address", address.clone())])
                    .await
                    .map_err(cache_error)?;
                Ok(rows.into_iter().next().map(|row| CacheEntry {
                    result: row.geocoded_result,
                    error: row.error.filter(|e| !e.is_empty()),
                }))
            }
            CacheKey::Coordinates {
                latitude,
                longitude,
            } => {
                let rows: Vec<ReverseCacheRow> = self
                    .client
                    .select_eq(
                        &self.reverse_table,
                        &Self::coordinate_filters(*latitude, *longitude),
                    )
                    .await
                    .map_err(cache_error)?;
                Ok(rows.into_iter().next().map(CacheEntry::from))
            }
        }
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        let last_updated = chrono::Utc::now().to_rfc3339();

        match key {
            CacheKey::Address(address) => {
                let row = serde_json::json!({
                    "address": address,
                    "full_address": entry.result.as_ref().and_then(|r| r.full_address.clone()),
                    "geocoded_result": entry.result,
                    "error": entry.error,
                    "last_updated": last_updated,
                });
                self.client
                    .upsert_eq(&self.forward_table, &[("address", address.clone())], &row)
                    .await
            }
            CacheKey::Coordinates {
                latitude,
                longitude,
            } => {
                let result = entry.result.unwrap_or_default();
                let row = serde_json::json!({
                    "latitude": latitude,
                    "longitude": longitude,
                    "full_address": result.full_address,
                    "state": result.region,
                    "county": result.county,
                    "postcode": result.postcode,
                    "city": result.city,
                    "street": result.street,
                    "street_number": result.street_number,
                    "error": entry.error,
                    "last_updated": last_updated,
                });
                self.client
                    .upsert_eq(
                        &self.reverse_table,
                        &Self::coordinate_filters(*latitude, *longitude),
                        &row,
                    )
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_row_with_error_is_failure() {
        let row = ReverseCacheRow {
            latitude: 38.4,
            longitude: -122.7,
            error: Some("No match found".to_string()),
            ..Default::default()
        };
        let entry = CacheEntry::from(row);
        assert!(!entry.is_success());
        assert_eq!(entry.error.as_deref(), Some("No match found"));
    }

    #[test]
    fn test_reverse_row_maps_state_to_region() {
        let row = ReverseCacheRow {
            latitude: 38.4,
            longitude: -122.7,
            full_address: Some("100 Main St, Sebastopol, CA 95472, USA".to_string()),
            state: Some("California".to_string()),
            error: Some(String::new()),
            ..Default::default()
        };
        let entry = CacheEntry::from(row);
        let result = entry.result.unwrap();
        assert_eq!(result.region.as_deref(), Some("California"));
        assert_eq!(result.latitude, 38.4);
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let config = SupabaseConfig::new("https://project.supabase.co/", "key");
        let client = SupabaseClient::new(&config).unwrap();
        assert_eq!(
            client.table_url("geocoding_cache"),
            "https://project.supabase.co/rest/v1/geocoding_cache"
        );
    }
}
