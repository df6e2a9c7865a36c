use crate::adapters::supabase::GeocodeCacheRow;
use crate::adapters::SupabaseCache;
use crate::app::pipelines::{write_json, DIRTY_FILE, PROCESSED_FILE, STATS_FILE};
use crate::domain::ports::{Pipeline, RecordCount, Storage};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodingStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Rows whose input address already equals the geocoded one, ignoring
    /// case and surrounding whitespace.
    pub exact_address_matches: usize,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl GeocodingStats {
    pub fn from_rows(rows: &[GeocodeCacheRow]) -> Self {
        let failed = rows
            .iter()
            .filter(|r| r.error.as_deref().is_some_and(|e| !e.is_empty()))
            .count();
        let exact_address_matches = rows
            .iter()
            .filter(|r| match (&r.address, &r.full_address) {
                (Some(address), Some(full)) if !address.is_empty() && !full.is_empty() => {
                    address.trim().to_lowercase() == full.trim().to_lowercase()
                }
                _ => false,
            })
            .count();

        Self {
            total: rows.len(),
            successful: rows.len() - failed,
            failed,
            exact_address_matches,
        }
    }

    pub fn successful_pct(&self) -> f64 {
        percent(self.successful, self.total)
    }

    pub fn failed_pct(&self) -> f64 {
        percent(self.failed, self.total)
    }

    pub fn exact_pct(&self) -> f64 {
        percent(self.exact_address_matches, self.total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFileStats {
    pub processed_records: usize,
    pub dirty_records: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StatsInput {
    pub cache_rows: Option<Vec<GeocodeCacheRow>>,
    pub files: DataFileStats,
}

impl RecordCount for StatsInput {
    fn record_count(&self) -> usize {
        self.cache_rows.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub geocoding: Option<GeocodingStats>,
    pub files: DataFileStats,
}

impl RecordCount for StatsReport {
    fn record_count(&self) -> usize {
        self.geocoding.as_ref().map_or(0, |g| g.total)
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.geocoding {
            Some(stats) if stats.total > 0 => {
                writeln!(f, "Geocoding Cache Statistics:")?;
                writeln!(f, "{}", "=".repeat(25))?;
                writeln!(f, "Total addresses processed: {}", stats.total)?;
                writeln!(
                    f,
                    "Successfully geocoded: {} ({:.1}%)",
                    stats.successful,
                    stats.successful_pct()
                )?;
                writeln!(
                    f,
                    "Failed to geocode: {} ({:.1}%)",
                    stats.failed,
                    stats.failed_pct()
                )?;
                writeln!(
                    f,
                    "Exact address matches: {} ({:.1}%)",
                    stats.exact_address_matches,
                    stats.exact_pct()
                )?;
            }
            Some(_) => writeln!(f, "No records found in the geocoding cache")?,
            None => writeln!(f, "Geocoding cache not configured")?,
        }
        writeln!(f)?;
        writeln!(
            f,
            "Number of records that need to be fixed: {}",
            self.files.dirty_records
        )?;
        write!(f, "Number of processed records: {}", self.files.processed_records)
    }
}

/// Aggregate figures for the geocode cache and the data directory.
pub struct StatsPipeline<S: Storage> {
    storage: S,
    cache: Option<SupabaseCache>,
}

impl<S: Storage> StatsPipeline<S> {
    pub fn new(storage: S, cache: Option<SupabaseCache>) -> Self {
        Self { storage, cache }
    }

    /// Length of `key` in a JSON data file; a missing file counts as empty.
    async fn count_entries(&self, path: &str, key: &str) -> Result<usize> {
        if !self.storage.exists(path).await {
            tracing::warn!("⚠️ Could not find {}", path);
            return Ok(0);
        }
        let bytes = self.storage.read_file(path).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        Ok(value
            .get(key)
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len))
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for StatsPipeline<S> {
    type Extracted = StatsInput;
    type Transformed = StatsReport;

    fn name(&self) -> &str {
        "stats"
    }

    async fn extract(&self) -> Result<StatsInput> {
        let cache_rows = match &self.cache {
            Some(cache) => Some(cache.forward_rows().await?),
            None => None,
        };

        Ok(StatsInput {
            cache_rows,
            files: DataFileStats {
                processed_records: self.count_entries(PROCESSED_FILE, "records").await?,
                dirty_records: self.count_entries(DIRTY_FILE, "dirty_cats").await?,
            },
        })
    }

    async fn transform(&self, data: StatsInput) -> Result<StatsReport> {
        Ok(StatsReport {
            geocoding: data.cache_rows.as_deref().map(GeocodingStats::from_rows),
            files: data.files,
        })
    }

    async fn load(&self, result: StatsReport) -> Result<String> {
        println!("{}", result);
        write_json(&self.storage, STATS_FILE, &result).await?;
        Ok(STATS_FILE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: &str, full_address: Option<&str>, error: Option<&str>) -> GeocodeCacheRow {
        GeocodeCacheRow {
            address: Some(address.to_string()),
            full_address: full_address.map(str::to_string),
            geocoded_result: None,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_geocoding_stats_from_rows() {
        let rows = vec![
            row("3697 Ross Rd", Some("  3697 ROSS RD "), None),
            row("5340 Skylane Blvd", Some("5340 Skylane Boulevard"), Some("")),
            row("nowhere", None, Some("No match found")),
            row("somewhere", None, Some("Error: timeout")),
        ];

        let stats = GeocodingStats::from_rows(&rows);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.exact_address_matches, 1);
        assert_eq!(stats.exact_pct(), 25.0);
    }

    #[test]
    fn test_report_display() {
        let report = StatsReport {
            geocoding: Some(GeocodingStats {
                total: 3,
                successful: 2,
                failed: 1,
                exact_address_matches: 0,
            }),
            files: DataFileStats {
                processed_records: 10,
                dirty_records: 4,
            },
        };

        let text = report.to_string();
        assert!(text.contains("Successfully geocoded: 2 (66.7%)"));
        assert!(text.contains("Failed to geocode: 1 (33.3%)"));
        assert!(text.ends_with("Number of processed records: 10"));
    }
}
