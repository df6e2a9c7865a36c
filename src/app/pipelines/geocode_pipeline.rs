use crate::app::pipelines::{
    csv_bytes, read_json, write_records, ADDRESS_AUDIT_FILE, FAILED_GEOCODE_FILE, GEOCODED_FILE,
};
use crate::domain::model::{
    AddressAuditRow, CacheEntry, CacheKey, ClinicRecord, FailedRecord, GeocodeOutcome,
    GeocodeOutput, GeocodeResult, GeocodedRecord, ProcessedData,
};
use crate::domain::ports::{GeocodeCache, Geocoder, Pipeline, RecordCount, Storage};
use crate::utils::error::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

const AUDIT_HEADERS: [&str; 6] = [
    "original_address",
    "geocoded_address",
    "owner_first_name",
    "owner_last_name",
    "cell_phone",
    "home_phone",
];

impl RecordCount for GeocodeOutput {
    fn record_count(&self) -> usize {
        self.geocoded.len() + self.failed.len()
    }
}

type Lookup = std::result::Result<GeocodeResult, String>;

fn describe(lookup: &Lookup) -> &str {
    match lookup {
        Ok(_) => "Success",
        Err(reason) => reason,
    }
}

/// Forward geocodes the cat and owner address of every processed record.
pub struct GeocodePipeline<S: Storage> {
    storage: S,
    geocoder: Box<dyn Geocoder>,
    cache: Arc<dyn GeocodeCache>,
    input: String,
    max_records: Option<usize>,
    // Addresses already resolved in this run.
    seen: Mutex<HashMap<String, Lookup>>,
}

impl<S: Storage> GeocodePipeline<S> {
    pub fn new(
        storage: S,
        geocoder: Box<dyn Geocoder>,
        cache: Arc<dyn GeocodeCache>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            geocoder,
            cache,
            input: input.into(),
            max_records: None,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    async fn remember(&self, cache_key: &CacheKey, entry: CacheEntry) {
        if let Err(e) = self.cache.put(cache_key, entry).await {
            tracing::warn!("⚠️ Could not cache {}: {}", cache_key.cache_id(), e);
        }
    }

    /// Cache first, then the provider. Failed cache entries are retried.
    async fn lookup(&self, address: &str) -> Result<Lookup> {
        if address.trim().is_empty() {
            return Ok(Err("No address provided".to_string()));
        }
        if let Some(known) = self.seen.lock().await.get(address) {
            return Ok(known.clone());
        }

        let cache_key = CacheKey::Address(address.to_string());
        let cached = match self.cache.get(&cache_key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("⚠️ Cache lookup failed for {}: {}", address, e);
                None
            }
        };

        let lookup = match cached.and_then(|entry| entry.result.filter(|_| entry.error.is_none())) {
            Some(result) => {
                tracing::debug!("Cache hit: {}", address);
                Ok(result)
            }
            None => match self.geocoder.forward(address).await {
                Ok(GeocodeOutcome::Found(result)) => {
                    tracing::debug!("Geocoded {} -> {:?}", address, result.full_address);
                    self.remember(&cache_key, CacheEntry::success(result.clone()))
                        .await;
                    Ok(result)
                }
                Ok(GeocodeOutcome::NotFound(reason)) => {
                    tracing::info!("No match for {}: {}", address, reason);
                    self.remember(&cache_key, CacheEntry::failure(reason.clone()))
                        .await;
                    Err(reason)
                }
                // Rejected credentials would fail every remaining address.
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => {
                    tracing::warn!("❌ Geocoding failed for {}: {}", address, e);
                    let reason = format!("Error: {}", e);
                    self.remember(&cache_key, CacheEntry::failure(reason.clone()))
                        .await;
                    Err(reason)
                }
            },
        };

        self.seen
            .lock()
            .await
            .insert(address.to_string(), lookup.clone());
        Ok(lookup)
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for GeocodePipeline<S> {
    type Extracted = Vec<ClinicRecord>;
    type Transformed = GeocodeOutput;

    fn name(&self) -> &str {
        "geocode"
    }

    async fn extract(&self) -> Result<Vec<ClinicRecord>> {
        let data: ProcessedData = read_json(&self.storage, &self.input).await?;
        let mut records = data.records;
        if let Some(max) = self.max_records {
            if records.len() > max {
                tracing::info!("📋 Limiting run to the first {} of {} records", max, records.len());
                records.truncate(max);
            }
        }
        Ok(records)
    }

    async fn transform(&self, data: Vec<ClinicRecord>) -> Result<GeocodeOutput> {
        let mut output = GeocodeOutput::default();
        let mut audited = HashSet::new();
        let total = data.len();

        for (index, record) in data.into_iter().enumerate() {
            tracing::debug!("Geocoding record {}/{}", index + 1, total);
            let ClinicRecord {
                cat,
                owner,
                appointment,
            } = record;

            let cat_lookup = self.lookup(&cat.full_address).await?;
            let owner_lookup = if owner.owner_address == cat.full_address {
                cat_lookup.clone()
            } else {
                self.lookup(&owner.owner_address).await?
            };

            if audited.insert(cat.full_address.clone()) {
                output.audit.push(AddressAuditRow {
                    original_address: cat.full_address.clone(),
                    geocoded_address: cat_lookup
                        .as_ref()
                        .ok()
                        .and_then(|r| r.full_address.clone())
                        .unwrap_or_default(),
                    owner_first_name: owner.owner_first_name.clone(),
                    owner_last_name: owner.owner_last_name.clone(),
                    cell_phone: owner.owner_cell_phone.clone().unwrap_or_default(),
                    home_phone: owner.owner_home_phone.clone().unwrap_or_default(),
                });
            }

            match (cat_lookup, owner_lookup) {
                (Ok(cat_location), Ok(owner_location)) => output.geocoded.push(GeocodedRecord {
                    cat,
                    owner,
                    appointment,
                    cat_location,
                    owner_location,
                }),
                (cat_lookup, owner_lookup) => {
                    let reason = if owner.owner_address == cat.full_address {
                        describe(&cat_lookup).to_string()
                    } else {
                        format!(
                            "Cat address: {}, Owner address: {}",
                            describe(&cat_lookup),
                            describe(&owner_lookup)
                        )
                    };
                    output.failed.push(FailedRecord {
                        cat,
                        owner,
                        appointment,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            "📍 {} records geocoded, {} failed, {} unique addresses looked up",
            output.geocoded.len(),
            output.failed.len(),
            self.seen.lock().await.len()
        );
        Ok(output)
    }

    async fn load(&self, result: GeocodeOutput) -> Result<String> {
        write_records(&self.storage, GEOCODED_FILE, &result.geocoded).await?;
        write_records(&self.storage, FAILED_GEOCODE_FILE, &result.failed).await?;

        let audit = csv_bytes(&AUDIT_HEADERS, &result.audit)?;
        self.storage.write_file(ADDRESS_AUDIT_FILE, &audit).await?;

        Ok(GEOCODED_FILE.to_string())
    }
}
