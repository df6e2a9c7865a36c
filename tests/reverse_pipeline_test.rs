use anyhow::Result;
use clinic_geo::adapters::GoogleGeocoder;
use clinic_geo::app::pipelines::ReversePipeline;
use clinic_geo::core::{CacheEntry, CacheKey, GeocodeCache, GeocodeResult, Storage};
use clinic_geo::domain::model::EnrichedLocation;
use clinic_geo::{EtlEngine, EtlError, InMemoryCache, LocalStorage};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const GEOCODE_PATH: &str = "/maps/api/geocode/json";

async fn setup(locations: serde_json::Value) -> Result<(TempDir, LocalStorage)> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    storage
        .write_file("locations.json", &serde_json::to_vec(&locations)?)
        .await?;
    Ok((temp_dir, storage))
}

fn geocoder(server: &MockServer) -> Result<Box<GoogleGeocoder>> {
    Ok(Box::new(GoogleGeocoder::new(
        server.url(GEOCODE_PATH),
        "maps-key",
        None,
        Some(5),
    )?))
}

#[tokio::test]
async fn test_reverse_pipeline_statuses() -> Result<()> {
    let (_temp_dir, storage) = setup(json!([
        {"name": "Skylane Clinic", "latitude": 38.5081, "longitude": -122.8057, "kind": "clinic"},
        {"name": "Ross Colony", "latitude": 38.4101, "longitude": -122.8712},
        {"name": "Unplaced", "latitude": 0.0, "longitude": -122.7},
        {"name": "Offshore", "latitude": 38.05, "longitude": -123.55},
        {"latitude": 38.3}
    ]))
    .await?;

    let server = MockServer::start();
    let found = server.mock(|when, then| {
        when.method(GET)
            .path(GEOCODE_PATH)
            .query_param("latlng", "38.5081,-122.8057")
            .query_param("key", "maps-key");
        then.status(200).json_body(json!({
            "status": "OK",
            "results": [{
                "formatted_address": "5340 Skylane Blvd, Santa Rosa, CA 95403, USA",
                "geometry": {"location": {"lat": 38.5081, "lng": -122.8057}},
                "address_components": [
                    {"long_name": "Santa Rosa", "short_name": "Santa Rosa", "types": ["locality", "political"]},
                    {"long_name": "California", "short_name": "CA", "types": ["administrative_area_level_1", "political"]}
                ]
            }]
        }));
    });
    let offshore = server.mock(|when, then| {
        when.method(GET)
            .path(GEOCODE_PATH)
            .query_param("latlng", "38.05,-123.55");
        then.status(200).json_body(json!({"status": "ZERO_RESULTS", "results": []}));
    });

    let cache = Arc::new(InMemoryCache::new());
    let ross = CacheKey::Coordinates {
        latitude: 38.4101,
        longitude: -122.8712,
    };
    cache
        .put(
            &ross,
            CacheEntry::success(GeocodeResult {
                full_address: Some("3697 Ross Rd, Sebastopol, CA 95472, USA".to_string()),
                latitude: 38.4101,
                longitude: -122.8712,
                ..Default::default()
            }),
        )
        .await?;

    let pipeline =
        ReversePipeline::new(storage.clone(), geocoder(&server)?, cache.clone(), "locations.json");
    let output = EtlEngine::new(pipeline).run().await?;
    assert_eq!(output, "processed_address_data.json");

    found.assert_hits(1);
    offshore.assert_hits(1);

    let enriched: Vec<EnrichedLocation> =
        serde_json::from_slice(&storage.read_file("processed_address_data.json").await?)?;
    assert_eq!(enriched.len(), 2);
    assert_eq!(enriched[0].location.extra.get("kind"), Some(&json!("clinic")));
    assert_eq!(enriched[0].address.city.as_deref(), Some("Santa Rosa"));
    assert_eq!(enriched[0].address.region.as_deref(), Some("California"));
    assert_eq!(enriched[1].location.display_name(), "Ross Colony");

    let audit = String::from_utf8(storage.read_file("reverse_geocode_audit.csv").await?)?;
    let lines: Vec<&str> = audit.lines().collect();
    assert_eq!(lines[0], "name,latitude,longitude,status,reason,full_address");
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("Skylane Clinic,") && lines[1].contains(",SUCCESS,"));
    assert!(lines[2].starts_with("Ross Colony,") && lines[2].contains(",CACHED,"));
    assert!(lines[3].ends_with(",FAILED,Missing coordinates,"));
    assert!(lines[4].ends_with(",FAILED,No match found,"));
    assert!(lines[5].starts_with("Unknown,") && lines[5].contains("Missing coordinates"));

    let failure = CacheKey::Coordinates {
        latitude: 38.05,
        longitude: -123.55,
    };
    assert_eq!(
        cache.get(&failure).await?,
        Some(CacheEntry::failure("No match found"))
    );
    Ok(())
}

#[tokio::test]
async fn test_cached_failure_is_retried() -> Result<()> {
    let (_temp_dir, storage) =
        setup(json!([{"name": "Retry", "latitude": 38.44, "longitude": -122.72}])).await?;

    let server = MockServer::start();
    let api = server.mock(|when, then| {
        when.method(GET).path(GEOCODE_PATH);
        then.status(200).json_body(json!({
            "status": "OK",
            "results": [{
                "formatted_address": "Santa Rosa, CA, USA",
                "geometry": {"location": {"lat": 38.44, "lng": -122.72}}
            }]
        }));
    });

    let cache = Arc::new(InMemoryCache::new());
    let key = CacheKey::Coordinates {
        latitude: 38.44,
        longitude: -122.72,
    };
    cache.put(&key, CacheEntry::failure("No match found")).await?;

    let pipeline =
        ReversePipeline::new(storage.clone(), geocoder(&server)?, cache.clone(), "locations.json");
    EtlEngine::new(pipeline).run().await?;

    api.assert_hits(1);
    assert!(cache.get(&key).await?.is_some_and(|entry| entry.is_success()));
    Ok(())
}

#[tokio::test]
async fn test_denied_key_aborts_run() -> Result<()> {
    let (_temp_dir, storage) =
        setup(json!([{"name": "Clinic", "latitude": 38.5, "longitude": -122.8}])).await?;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(GEOCODE_PATH);
        then.status(403).body("API key not valid");
    });

    let pipeline = ReversePipeline::new(
        storage.clone(),
        geocoder(&server)?,
        Arc::new(InMemoryCache::new()),
        "locations.json",
    );
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();

    assert!(err.is_auth_failure());
    assert!(matches!(err, EtlError::HttpStatusError { ref service, .. } if service == "google"));
    assert!(!storage.exists("processed_address_data.json").await);
    Ok(())
}
