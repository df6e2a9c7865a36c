use anyhow::Result;
use clinic_geo::app::pipelines::compare_pipeline::CompareSummary;
use clinic_geo::app::pipelines::{AddressSource, ComparePipeline};
use clinic_geo::core::Storage;
use clinic_geo::{EtlEngine, EtlError, LocalStorage};
use std::io::Cursor;
use tempfile::TempDir;

const FORWARD_CSV: &str = "\
address,full_address,error
100 main st sebastopol,\"100 Main St, Sebastopol, CA 95472, USA\",
123 main st,\"123 Main St, Santa Rosa, CA\",
789 pine,789 Pine Rd,
nowhere,,No match found
";

const REVERSE_CSV: &str = "\
latitude,longitude,full_address
38.40,-122.82,\"100 Main St, Sebastopol, CA 95472, USA\"
38.44,-122.71,123 Main Street Santa Rosa CA
38.45,-122.70,987 Pine Rd
38.46,-122.69,1 Elm St
";

async fn setup() -> Result<(TempDir, LocalStorage)> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    storage
        .write_file("geocoding_cache_rows.csv", FORWARD_CSV.as_bytes())
        .await?;
    storage
        .write_file("reverse_geocoding_cache_rows.csv", REVERSE_CSV.as_bytes())
        .await?;
    Ok((temp_dir, storage))
}

fn csv_source(column: &str) -> AddressSource {
    AddressSource::Csv {
        left: "geocoding_cache_rows.csv".to_string(),
        right: "reverse_geocoding_cache_rows.csv".to_string(),
        column: column.to_string(),
    }
}

#[tokio::test]
async fn test_compare_pipeline_writes_reports() -> Result<()> {
    let (_temp_dir, storage) = setup().await?;

    let pipeline = ComparePipeline::new(storage.clone(), csv_source("full_address"), 0.7);
    let output = EtlEngine::new(pipeline).run().await?;
    assert_eq!(output, "match_summary.json");

    let exact = String::from_utf8(storage.read_file("exact_matches.csv").await?)?;
    let exact_lines: Vec<&str> = exact.lines().collect();
    assert_eq!(
        exact_lines[0],
        "forward_address,reverse_address,normalized_address"
    );
    assert_eq!(exact_lines.len(), 3);
    // Verbatim duplicates come first.
    assert!(exact_lines[1].starts_with(
        "\"100 Main St, Sebastopol, CA 95472, USA\",\"100 Main St, Sebastopol, CA 95472, USA\","
    ));
    assert!(exact_lines[2].starts_with("\"123 Main St, Santa Rosa, CA\",123 Main Street Santa Rosa CA,"));

    let fuzzy = String::from_utf8(storage.read_file("fuzzy_matches.csv").await?)?;
    assert_eq!(
        fuzzy,
        "forward_address,reverse_address,similarity_score\n789 Pine Rd,987 Pine Rd,0.8182\n"
    );

    let summary: CompareSummary =
        serde_json::from_slice(&storage.read_file("match_summary.json").await?)?;
    assert_eq!(summary.unique_left, 3);
    assert_eq!(summary.unique_right, 4);
    assert_eq!(summary.raw_identical, 1);
    assert_eq!(summary.matcher.exact_matches, 1);
    assert_eq!(summary.matcher.fuzzy_matches, 1);
    assert_eq!(summary.matcher.unmatched_b, 1);
    assert_eq!(summary.match_percentage, 75.0);
    Ok(())
}

#[tokio::test]
async fn test_compare_pipeline_zip_bundle() -> Result<()> {
    let (_temp_dir, storage) = setup().await?;

    let pipeline = ComparePipeline::new(storage.clone(), csv_source("full_address"), 0.9)
        .with_zip_bundle(Some("address_matches.zip".to_string()));
    let output = EtlEngine::new(pipeline).run().await?;
    assert_eq!(output, "address_matches.zip");

    let zip_data = storage.read_file("address_matches.zip").await?;
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_data))?;
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["exact_matches.csv", "fuzzy_matches.csv", "match_summary.json"]
    );

    // 0.8182 is below this threshold.
    let mut fuzzy = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("fuzzy_matches.csv")?, &mut fuzzy)?;
    assert_eq!(fuzzy, "forward_address,reverse_address,similarity_score\n");
    Ok(())
}

#[tokio::test]
async fn test_compare_pipeline_missing_column() -> Result<()> {
    let (_temp_dir, storage) = setup().await?;

    let pipeline = ComparePipeline::new(storage.clone(), csv_source("address"), 0.7);
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();

    match err {
        EtlError::ProcessingError { message } => {
            assert_eq!(message, "reverse_geocoding_cache_rows.csv has no 'address' column")
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!storage.exists("match_summary.json").await);
    Ok(())
}
