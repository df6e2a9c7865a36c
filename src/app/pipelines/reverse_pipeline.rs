use crate::app::pipelines::{
    csv_bytes, read_json, write_json, REVERSE_AUDIT_FILE, REVERSE_OUTPUT_FILE,
};
use crate::domain::model::{
    CacheEntry, CacheKey, EnrichedLocation, GeocodeOutcome, Location, LookupStatus,
    ReverseAuditRow, ReverseOutput,
};
use crate::domain::ports::{GeocodeCache, Pipeline, RecordCount, ReverseGeocoder, Storage};
use crate::utils::error::Result;
use std::sync::Arc;

const AUDIT_HEADERS: [&str; 6] = [
    "name",
    "latitude",
    "longitude",
    "status",
    "reason",
    "full_address",
];

impl RecordCount for ReverseOutput {
    fn record_count(&self) -> usize {
        self.enriched.len()
    }
}

/// Zero is what the location exports use for "unknown".
fn coordinates(location: &Location) -> Option<(f64, f64)> {
    match (location.latitude, location.longitude) {
        (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => Some((lat, lon)),
        _ => None,
    }
}

fn failed(location: &Location, reason: impl Into<String>) -> ReverseAuditRow {
    ReverseAuditRow {
        name: location.display_name().to_string(),
        latitude: location.latitude,
        longitude: location.longitude,
        status: LookupStatus::Failed,
        reason: Some(reason.into()),
        full_address: None,
    }
}

/// Resolves coordinates of a list of locations into street addresses.
pub struct ReversePipeline<S: Storage> {
    storage: S,
    geocoder: Box<dyn ReverseGeocoder>,
    cache: Arc<dyn GeocodeCache>,
    input: String,
}

impl<S: Storage> ReversePipeline<S> {
    pub fn new(
        storage: S,
        geocoder: Box<dyn ReverseGeocoder>,
        cache: Arc<dyn GeocodeCache>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            geocoder,
            cache,
            input: input.into(),
        }
    }

    async fn remember(&self, key: &CacheKey, entry: CacheEntry) {
        if let Err(e) = self.cache.put(key, entry).await {
            tracing::warn!("⚠️ Could not cache {}: {}", key.cache_id(), e);
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ReversePipeline<S> {
    type Extracted = Vec<Location>;
    type Transformed = ReverseOutput;

    fn name(&self) -> &str {
        "reverse"
    }

    async fn extract(&self) -> Result<Vec<Location>> {
        read_json(&self.storage, &self.input).await
    }

    async fn transform(&self, data: Vec<Location>) -> Result<ReverseOutput> {
        let mut output = ReverseOutput::default();
        let total = data.len();

        for (index, location) in data.into_iter().enumerate() {
            tracing::debug!(
                "Processing location {}/{}: {}",
                index + 1,
                total,
                location.display_name()
            );

            let Some((latitude, longitude)) = coordinates(&location) else {
                tracing::warn!("Missing coordinates for location: {}", location.display_name());
                output.audit.push(failed(&location, "Missing coordinates"));
                continue;
            };

            let key = CacheKey::Coordinates {
                latitude,
                longitude,
            };
            let cached = match self.cache.get(&key).await {
                Ok(entry) => entry.filter(CacheEntry::is_success),
                Err(e) => {
                    tracing::warn!("⚠️ Cache lookup failed for {}: {}", key.cache_id(), e);
                    None
                }
            };

            let (result, status) = match cached.and_then(|entry| entry.result) {
                Some(result) => (result, LookupStatus::Cached),
                None => {
                    let lookup = match self.geocoder.reverse(latitude, longitude).await {
                        Ok(GeocodeOutcome::Found(result)) => {
                            self.remember(&key, CacheEntry::success(result.clone())).await;
                            Ok(result)
                        }
                        Ok(GeocodeOutcome::NotFound(reason)) => Err(reason),
                        Err(e) if e.is_auth_failure() => return Err(e),
                        Err(e) => Err(format!("Error: {}", e)),
                    };
                    match lookup {
                        Ok(result) => (result, LookupStatus::Success),
                        Err(reason) => {
                            tracing::info!("Could not resolve {}: {}", key.cache_id(), reason);
                            self.remember(&key, CacheEntry::failure(reason.clone())).await;
                            output.audit.push(failed(&location, reason));
                            continue;
                        }
                    }
                }
            };

            output.audit.push(ReverseAuditRow {
                name: location.display_name().to_string(),
                latitude: location.latitude,
                longitude: location.longitude,
                status,
                reason: None,
                full_address: result.full_address.clone(),
            });
            output.enriched.push(EnrichedLocation {
                location,
                address: result,
            });
        }

        tracing::info!(
            "📍 {} of {} locations resolved",
            output.enriched.len(),
            total
        );
        Ok(output)
    }

    async fn load(&self, result: ReverseOutput) -> Result<String> {
        write_json(&self.storage, REVERSE_OUTPUT_FILE, &result.enriched).await?;

        let audit = csv_bytes(&AUDIT_HEADERS, &result.audit)?;
        self.storage.write_file(REVERSE_AUDIT_FILE, &audit).await?;

        Ok(REVERSE_OUTPUT_FILE.to_string())
    }
}
