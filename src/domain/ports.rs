use crate::domain::model::{CacheEntry, CacheKey, GeocodeOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// How many records a pipeline stage produced, for progress logging.
pub trait RecordCount {
    fn record_count(&self) -> usize;
}

impl<T> RecordCount for Vec<T> {
    fn record_count(&self) -> usize {
        self.len()
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: RecordCount + Send;
    type Transformed: RecordCount + Send;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    /// Persists the result and returns where it went.
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn provider(&self) -> &'static str;
    async fn forward(&self, address: &str) -> Result<GeocodeOutcome>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<GeocodeOutcome>;
}

/// Geocode results keyed by address or coordinates. Failed lookups are
/// stored too, with their reason.
#[async_trait]
pub trait GeocodeCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;
    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()>;
}
