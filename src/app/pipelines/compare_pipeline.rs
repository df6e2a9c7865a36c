use crate::adapters::SupabaseCache;
use crate::app::pipelines::{
    csv_bytes, write_json, EXACT_MATCHES_FILE, FUZZY_MATCHES_FILE, MATCH_SUMMARY_FILE,
};
use crate::core::matcher::{AddressMatcher, ExactMatch, MatchResult, MatchSummary};
use crate::core::normalize::normalize;
use crate::domain::ports::{Pipeline, RecordCount, Storage};
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// Where the two address lists come from.
pub enum AddressSource {
    /// `full_address` of the forward (A) and reverse (B) cache tables.
    Supabase(SupabaseCache),
    /// Two CSV exports inside the data directory.
    Csv {
        left: String,
        right: String,
        column: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AddressSets {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl RecordCount for AddressSets {
    fn record_count(&self) -> usize {
        self.left.len() + self.right.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareSummary {
    pub threshold: f64,
    pub unique_left: usize,
    pub unique_right: usize,
    /// Addresses present verbatim on both sides.
    pub raw_identical: usize,
    /// Matcher figures for the addresses that were not identical.
    pub matcher: MatchSummary,
    /// Identical, exact and fuzzy matches over the unique right-hand addresses.
    pub match_percentage: f64,
}

#[derive(Debug, Clone)]
pub struct CompareReport {
    pub identical: Vec<String>,
    pub result: MatchResult,
    pub summary: CompareSummary,
}

impl RecordCount for CompareReport {
    fn record_count(&self) -> usize {
        self.identical.len() + self.result.exact.len() + self.result.fuzzy.len()
    }
}

#[derive(Serialize)]
struct ExactRow<'a> {
    forward_address: &'a str,
    reverse_address: &'a str,
    normalized_address: &'a str,
}

#[derive(Serialize)]
struct FuzzyRow<'a> {
    forward_address: &'a str,
    reverse_address: &'a str,
    similarity_score: String,
}

/// Splits off the addresses both sides share verbatim; the matcher only
/// sees the rest.
pub fn compare_addresses(left: &[String], right: &[String], threshold: f64) -> CompareReport {
    let left_set: BTreeSet<&str> = left
        .iter()
        .map(String::as_str)
        .filter(|a| !a.trim().is_empty())
        .collect();
    let right_set: BTreeSet<&str> = right
        .iter()
        .map(String::as_str)
        .filter(|a| !a.trim().is_empty())
        .collect();

    let identical: Vec<String> = left_set
        .intersection(&right_set)
        .map(|a| a.to_string())
        .collect();

    let result = AddressMatcher::new(threshold).find_matches(
        left_set.difference(&right_set).copied(),
        right_set.difference(&left_set).copied(),
    );
    let matcher = result.summary();

    let matched = identical.len() + matcher.exact_matches + matcher.fuzzy_matches;
    let match_percentage = if right_set.is_empty() {
        0.0
    } else {
        matched as f64 / right_set.len() as f64 * 100.0
    };

    CompareReport {
        summary: CompareSummary {
            threshold,
            unique_left: left_set.len(),
            unique_right: right_set.len(),
            raw_identical: identical.len(),
            matcher,
            match_percentage,
        },
        identical,
        result,
    }
}

fn read_address_column(bytes: &[u8], column: &str, file: &str) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| EtlError::ProcessingError {
            message: format!("{} has no '{}' column", file, column),
        })?;

    let mut addresses = Vec::new();
    for row in reader.records() {
        if let Some(value) = row?.get(index) {
            if !value.trim().is_empty() {
                addresses.push(value.to_string());
            }
        }
    }
    Ok(addresses)
}

/// Reconciles the addresses of the forward and reverse geocode caches.
pub struct ComparePipeline<S: Storage> {
    storage: S,
    source: AddressSource,
    threshold: f64,
    zip_bundle: Option<String>,
}

impl<S: Storage> ComparePipeline<S> {
    pub fn new(storage: S, source: AddressSource, threshold: f64) -> Self {
        Self {
            storage,
            source,
            threshold,
            zip_bundle: None,
        }
    }

    /// Also pack the three report files into this archive.
    pub fn with_zip_bundle(mut self, filename: Option<String>) -> Self {
        self.zip_bundle = filename;
        self
    }

    fn bundle(files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            zip.start_file::<_, ()>(*name, FileOptions::default())?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ComparePipeline<S> {
    type Extracted = AddressSets;
    type Transformed = CompareReport;

    fn name(&self) -> &str {
        "compare"
    }

    async fn extract(&self) -> Result<AddressSets> {
        match &self.source {
            AddressSource::Supabase(cache) => {
                let (left, right) = cache.full_addresses().await?;
                Ok(AddressSets { left, right })
            }
            AddressSource::Csv {
                left,
                right,
                column,
            } => {
                tracing::info!("📂 Comparing {} against {}", left, right);
                let left_bytes = self.storage.read_file(left).await?;
                let right_bytes = self.storage.read_file(right).await?;
                Ok(AddressSets {
                    left: read_address_column(&left_bytes, column, left)?,
                    right: read_address_column(&right_bytes, column, right)?,
                })
            }
        }
    }

    async fn transform(&self, data: AddressSets) -> Result<CompareReport> {
        let report = compare_addresses(&data.left, &data.right, self.threshold);
        let summary = &report.summary;

        tracing::info!(
            "🔎 {} identical, {} exact after normalization, {} fuzzy ({:.2}% of {} reference addresses)",
            summary.raw_identical,
            summary.matcher.exact_matches,
            summary.matcher.fuzzy_matches,
            summary.match_percentage,
            summary.unique_right
        );
        Ok(report)
    }

    async fn load(&self, report: CompareReport) -> Result<String> {
        let normalized_identical: Vec<String> =
            report.identical.iter().map(|a| normalize(a)).collect();

        let exact_rows: Vec<ExactRow> = report
            .identical
            .iter()
            .zip(&normalized_identical)
            .map(|(a, normalized)| ExactRow {
                forward_address: a,
                reverse_address: a,
                normalized_address: normalized,
            })
            .chain(report.result.exact.iter().map(|m: &ExactMatch| ExactRow {
                forward_address: &m.address_a,
                reverse_address: &m.address_b,
                normalized_address: &m.normalized,
            }))
            .collect();
        let exact_csv = csv_bytes(
            &["forward_address", "reverse_address", "normalized_address"],
            &exact_rows,
        )?;

        let fuzzy_rows: Vec<FuzzyRow> = report
            .result
            .fuzzy
            .iter()
            .map(|m| FuzzyRow {
                forward_address: &m.address_a,
                reverse_address: &m.address_b,
                similarity_score: m.formatted_score(),
            })
            .collect();
        let fuzzy_csv = csv_bytes(
            &["forward_address", "reverse_address", "similarity_score"],
            &fuzzy_rows,
        )?;
        let summary_json = serde_json::to_vec_pretty(&report.summary)?;

        self.storage.write_file(EXACT_MATCHES_FILE, &exact_csv).await?;
        self.storage.write_file(FUZZY_MATCHES_FILE, &fuzzy_csv).await?;
        write_json(&self.storage, MATCH_SUMMARY_FILE, &report.summary).await?;

        if let Some(bundle) = &self.zip_bundle {
            let zip_data = Self::bundle(&[
                (EXACT_MATCHES_FILE, exact_csv.as_slice()),
                (FUZZY_MATCHES_FILE, fuzzy_csv.as_slice()),
                (MATCH_SUMMARY_FILE, summary_json.as_slice()),
            ])?;
            self.storage.write_file(bundle, &zip_data).await?;
            tracing::info!("📦 Report bundled into {}", bundle);
            return Ok(bundle.clone());
        }

        Ok(MATCH_SUMMARY_FILE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_identical_addresses_bypass_matcher() {
        let left = strings(&[
            "100 Main St, Sebastopol, CA 95472, USA",
            "123 Main St, Santa Rosa, CA",
            "789 Pine Rd",
        ]);
        let right = strings(&[
            "100 Main St, Sebastopol, CA 95472, USA",
            "123 Main Street Santa Rosa CA",
            "987 Pine Rd",
            "1 Elm St",
        ]);

        let report = compare_addresses(&left, &right, 0.7);

        assert_eq!(report.identical, strings(&["100 Main St, Sebastopol, CA 95472, USA"]));
        assert_eq!(report.result.exact.len(), 1);
        assert_eq!(report.result.fuzzy.len(), 1);
        assert_eq!(report.summary.unique_right, 4);
        assert_eq!(report.summary.matcher.total_b, 3);
        assert_eq!(report.summary.match_percentage, 75.0);
    }

    #[test]
    fn test_read_address_column() {
        let csv = b"id,full_address\n1,3697 Ross Rd\n2,\n3,5340 Skylane Blvd\n";
        assert_eq!(
            read_address_column(csv, "full_address", "cache.csv").unwrap(),
            strings(&["3697 Ross Rd", "5340 Skylane Blvd"])
        );
        assert!(read_address_column(csv, "address", "cache.csv").is_err());
    }

    #[test]
    fn test_bundle_contains_every_report() {
        let zip_data = ComparePipeline::<crate::adapters::LocalStorage>::bundle(&[
            (EXACT_MATCHES_FILE, b"a".as_slice()),
            (FUZZY_MATCHES_FILE, b"b".as_slice()),
        ])
        .unwrap();

        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&EXACT_MATCHES_FILE));
    }
}
