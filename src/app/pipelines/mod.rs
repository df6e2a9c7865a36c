pub mod compare_pipeline;
pub mod geocode_pipeline;
pub mod process_pipeline;
pub mod reverse_pipeline;
pub mod stats_pipeline;

pub use compare_pipeline::{AddressSource, ComparePipeline};
pub use geocode_pipeline::GeocodePipeline;
pub use process_pipeline::ProcessPipeline;
pub use reverse_pipeline::ReversePipeline;
pub use stats_pipeline::StatsPipeline;

use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const RAW_CLINIC_FILE: &str = "clinichq_raw_data.json";
pub const PROCESSED_FILE: &str = "processed_cat_data.json";
pub const DIRTY_FILE: &str = "dirty_cats.json";
pub const DIRTY_CSV_FILE: &str = "dirty_cats.csv";
pub const GEOCODED_FILE: &str = "geocoded_cat_data.json";
pub const FAILED_GEOCODE_FILE: &str = "failed_geocoded_cats.json";
pub const ADDRESS_AUDIT_FILE: &str = "address_audit.csv";
pub const REVERSE_OUTPUT_FILE: &str = "processed_address_data.json";
pub const REVERSE_AUDIT_FILE: &str = "reverse_geocode_audit.csv";
pub const EXACT_MATCHES_FILE: &str = "exact_matches.csv";
pub const FUZZY_MATCHES_FILE: &str = "fuzzy_matches.csv";
pub const MATCH_SUMMARY_FILE: &str = "match_summary.json";
pub const STATS_FILE: &str = "stats_summary.json";

pub(crate) async fn read_json<S: Storage, T: DeserializeOwned>(storage: &S, path: &str) -> Result<T> {
    let bytes = storage.read_file(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) async fn write_json<S: Storage, T: Serialize + Sync + ?Sized>(
    storage: &S,
    path: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    storage.write_file(path, &bytes).await?;
    tracing::debug!("Wrote {} ({} bytes)", path, bytes.len());
    Ok(())
}

#[derive(Serialize)]
struct RecordsRef<'a, T> {
    records: &'a [T],
}

/// Writes `{"records": [...]}`, the layout read back as a
/// [`RecordsFile`](crate::domain::model::RecordsFile).
pub(crate) async fn write_records<S: Storage, T: Serialize + Sync>(
    storage: &S,
    path: &str,
    records: &[T],
) -> Result<()> {
    write_json(storage, path, &RecordsRef { records }).await
}

/// CSV with an explicit header row, so an empty table still has columns.
pub(crate) fn csv_bytes<T: Serialize>(headers: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}
