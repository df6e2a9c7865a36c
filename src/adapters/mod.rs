// Adapters layer: concrete implementations of the domain ports for external
// systems (filesystem, Supabase, Mapbox, Google Maps, ClinicHQ).

pub mod clinichq;
pub mod google;
pub mod local_storage;
pub mod mapbox;
pub mod memory_cache;
pub mod supabase;

use crate::utils::error::{EtlError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

pub use clinichq::ClinicHqClient;
pub use google::GoogleGeocoder;
pub use local_storage::LocalStorage;
pub use mapbox::MapboxGeocoder;
pub use memory_cache::InMemoryCache;
pub use supabase::{SupabaseCache, SupabaseClient};

pub(crate) fn http_client(timeout_seconds: Option<u64>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout_seconds {
        builder = builder.timeout(Duration::from_secs(timeout));
    }
    Ok(builder.build()?)
}

/// Turns a non-2xx response into [`EtlError::HttpStatusError`], keeping the
/// body for the log.
pub(crate) async fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("{} responded with {}: {}", service, status, body);
    Err(EtlError::HttpStatusError {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}
