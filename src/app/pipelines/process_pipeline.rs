use crate::adapters::ClinicHqClient;
use crate::app::pipelines::{
    csv_bytes, write_json, write_records, DIRTY_CSV_FILE, DIRTY_FILE, PROCESSED_FILE,
    RAW_CLINIC_FILE,
};
use crate::domain::clinic::{clean_record, parse_raw_payload, RawRecord};
use crate::domain::model::{DirtyData, DirtyRecord, ProcessOutput};
use crate::domain::ports::{Pipeline, RecordCount, Storage};
use crate::utils::error::Result;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;

impl RecordCount for ProcessOutput {
    fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Raw ClinicHQ appointments in, clean and dirty records out.
pub struct ProcessPipeline<S: Storage> {
    storage: S,
    input: String,
    fetcher: Option<ClinicHqClient>,
    today: NaiveDate,
}

impl<S: Storage> ProcessPipeline<S> {
    pub fn new(storage: S, input: impl Into<String>) -> Self {
        Self {
            storage,
            input: input.into(),
            fetcher: None,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Download from ClinicHQ first and keep the raw body next to the outputs.
    pub fn with_fetcher(mut self, fetcher: ClinicHqClient) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Reference date for age calculation.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Flat table over the union of raw keys, with `reason` last.
fn dirty_csv(dirty: &[DirtyRecord]) -> Result<Vec<u8>> {
    let columns: BTreeSet<&str> = dirty
        .iter()
        .flat_map(|d| d.raw.keys().map(String::as_str))
        .filter(|k| *k != "reason")
        .collect();
    let mut headers: Vec<&str> = columns.into_iter().collect();
    headers.push("reason");

    let rows: Vec<Vec<String>> = dirty
        .iter()
        .map(|d| {
            headers
                .iter()
                .map(|column| match *column {
                    "reason" => d.reason.clone(),
                    key => csv_cell(d.raw.get(key)),
                })
                .collect()
        })
        .collect();

    csv_bytes(&headers, &rows)
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ProcessPipeline<S> {
    type Extracted = Vec<RawRecord>;
    type Transformed = ProcessOutput;

    fn name(&self) -> &str {
        "process"
    }

    async fn extract(&self) -> Result<Vec<RawRecord>> {
        let bytes = match &self.fetcher {
            Some(fetcher) => {
                let body = fetcher.fetch_appointments().await?;
                self.storage.write_file(RAW_CLINIC_FILE, &body).await?;
                tracing::info!("💾 Raw ClinicHQ data saved to {}", RAW_CLINIC_FILE);
                body
            }
            None => {
                tracing::info!("📂 Reading raw appointments from {}", self.input);
                self.storage.read_file(&self.input).await?
            }
        };

        parse_raw_payload(&bytes)
    }

    async fn transform(&self, data: Vec<RawRecord>) -> Result<ProcessOutput> {
        let mut output = ProcessOutput::default();

        for raw in data {
            match clean_record(raw, self.today) {
                Ok(record) => output.records.push(record),
                Err(dirty) => {
                    tracing::debug!("Rejected record: {}", dirty.reason);
                    output.dirty.push(dirty);
                }
            }
        }

        tracing::info!(
            "🧹 {} clean records, {} need fixing",
            output.records.len(),
            output.dirty.len()
        );
        Ok(output)
    }

    async fn load(&self, result: ProcessOutput) -> Result<String> {
        write_records(&self.storage, PROCESSED_FILE, &result.records).await?;

        let dirty_csv = dirty_csv(&result.dirty)?;
        write_json(
            &self.storage,
            DIRTY_FILE,
            &DirtyData {
                dirty_cats: result.dirty,
            },
        )
        .await?;
        self.storage.write_file(DIRTY_CSV_FILE, &dirty_csv).await?;

        Ok(PROCESSED_FILE.to_string())
    }
}
