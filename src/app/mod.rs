// Application layer: wires configuration to adapters and runs the batch jobs.

pub mod pipelines;

use crate::adapters::{GoogleGeocoder, InMemoryCache, MapboxGeocoder, SupabaseCache};
use crate::config::toml_config::{AppConfig, GeocoderConfig, GeocoderProvider};
use crate::domain::ports::{GeocodeCache, Geocoder, ReverseGeocoder};
use crate::utils::error::Result;
use std::sync::Arc;

/// Supabase when configured, otherwise a cache that lives for this run only.
pub fn build_cache(config: &AppConfig) -> Result<Arc<dyn GeocodeCache>> {
    match &config.supabase {
        Some(supabase) => {
            tracing::info!("🗄️ Using Supabase geocode cache at {}", supabase.url);
            Ok(Arc::new(SupabaseCache::from_config(supabase)?))
        }
        None => {
            tracing::warn!("⚠️ Supabase not configured, geocode results will not be persisted");
            Ok(Arc::new(InMemoryCache::new()))
        }
    }
}

pub fn build_geocoder(config: &GeocoderConfig) -> Result<Box<dyn Geocoder>> {
    tracing::info!("🌍 Forward geocoding with {}", config.provider);
    match config.provider {
        GeocoderProvider::Mapbox => Ok(Box::new(MapboxGeocoder::from_config(config)?)),
        GeocoderProvider::Google => Ok(Box::new(GoogleGeocoder::from_config(config)?)),
    }
}

/// Reverse lookups always go to Google.
pub fn build_reverse_geocoder(config: &GeocoderConfig) -> Result<Box<dyn ReverseGeocoder>> {
    Ok(Box::new(GoogleGeocoder::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;

    #[test]
    fn test_build_geocoder_needs_credentials() {
        let mut config = GeocoderConfig::default();
        assert!(matches!(
            build_geocoder(&config).err(),
            Some(EtlError::MissingConfigError { .. })
        ));

        config.provider = GeocoderProvider::Google;
        config.google_api_key = Some("key".to_string());
        assert_eq!(build_geocoder(&config).unwrap().provider(), "google");
    }

    #[test]
    fn test_build_cache_without_supabase_is_in_memory() {
        let config = AppConfig::default();
        assert!(build_cache(&config).is_ok());
    }
}
