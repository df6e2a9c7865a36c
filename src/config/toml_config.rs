use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PROXIMITY: &str = "-122.720306,38.444660";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub paths: PathsConfig,
    pub supabase: Option<SupabaseConfig>,
    pub clinichq: ClinicHqConfig,
    pub geocoder: GeocoderConfig,
    pub matching: MatchingConfig,
    pub compare: CompareConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "clinic-geo".to_string(),
            description: "Clinic appointment address pipeline".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Every job reads and writes relative to this directory.
    pub data_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    #[serde(default = "default_geocoding_table")]
    pub geocoding_table: String,
    #[serde(default = "default_reverse_table")]
    pub reverse_table: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    pub timeout_seconds: Option<u64>,
}

fn default_geocoding_table() -> String {
    "geocoding_cache".to_string()
}

fn default_reverse_table() -> String {
    "reverse_geocoding_cache".to_string()
}

fn default_page_size() -> usize {
    1000
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            geocoding_table: default_geocoding_table(),
            reverse_table: default_reverse_table(),
            page_size: default_page_size(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicHqConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub date_from: String,
    /// Defaults to the current time when unset.
    pub date_to: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for ClinicHqConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.clinichq.com/appointments".to_string(),
            api_key: None,
            date_from: "2013-01-01T08:00:00.000Z".to_string(),
            date_to: None,
            timeout_seconds: Some(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum GeocoderProvider {
    #[default]
    Mapbox,
    Google,
}

impl std::fmt::Display for GeocoderProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeocoderProvider::Mapbox => write!(f, "mapbox"),
            GeocoderProvider::Google => write!(f, "google"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub provider: GeocoderProvider,
    pub mapbox_endpoint: String,
    pub mapbox_token: Option<String>,
    /// `"lon,lat"` bias point for Mapbox results.
    pub proximity: Option<String>,
    pub google_endpoint: String,
    pub google_api_key: Option<String>,
    pub google_components: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_records: Option<usize>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: GeocoderProvider::Mapbox,
            mapbox_endpoint: "https://api.mapbox.com/search/geocode/v6/forward".to_string(),
            mapbox_token: None,
            proximity: Some(DEFAULT_PROXIMITY.to_string()),
            google_endpoint: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            google_api_key: None,
            google_components: Some("administrative_area:CA|country:US".to_string()),
            timeout_seconds: Some(30),
            max_records: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: crate::core::matcher::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Local CSV exports; when both are set they replace the Supabase tables.
    pub left_csv: Option<String>,
    pub right_csv: Option<String>,
    pub address_column: String,
    pub compression: Option<CompressionConfig>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            left_csv: None,
            right_csv: None,
            address_column: "full_address".to_string(),
            compression: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

/// A value still holding an unresolved `${VAR}` placeholder counts as unset.
fn is_placeholder(value: &str) -> bool {
    value.trim().is_empty() || (value.starts_with("${") && value.ends_with('}'))
}

fn resolved(value: Option<String>, env_var: &str) -> Option<String> {
    value
        .filter(|v| !is_placeholder(v))
        .or_else(|| std::env::var(env_var).ok())
        .filter(|v| !is_placeholder(v))
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Reads `path` when it exists, otherwise starts from defaults. Either
    /// way credentials missing from the file are taken from the environment.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            Self::from_file(path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults and environment",
                path.display()
            );
            Self::default()
        };
        config.apply_env_fallbacks();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SUPABASE_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Fills credentials that the file left out from the usual environment
    /// variables (`SUPABASE_URL`, `SUPABASE_KEY`, `MAPBOX_ACCESS_TOKEN`,
    /// `GOOGLE_MAPS_API_KEY`, `CLINICHQ_API_KEY`).
    pub fn apply_env_fallbacks(&mut self) {
        let supabase = self.supabase.take();
        let url = resolved(supabase.as_ref().map(|s| s.url.clone()), "SUPABASE_URL");
        let key = resolved(supabase.as_ref().map(|s| s.key.clone()), "SUPABASE_KEY");
        self.supabase = match (url, key) {
            (Some(url), Some(key)) => {
                let mut merged = supabase.unwrap_or_else(|| SupabaseConfig::new("", ""));
                merged.url = url;
                merged.key = key;
                Some(merged)
            }
            _ => None,
        };

        self.geocoder.mapbox_token =
            resolved(self.geocoder.mapbox_token.take(), "MAPBOX_ACCESS_TOKEN");
        self.geocoder.google_api_key =
            resolved(self.geocoder.google_api_key.take(), "GOOGLE_MAPS_API_KEY");
        self.clinichq.api_key = resolved(self.clinichq.api_key.take(), "CLINICHQ_API_KEY");
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("paths.data_dir", &self.paths.data_dir)?;

        if let Some(supabase) = &self.supabase {
            validation::validate_url("supabase.url", &supabase.url)?;
            validation::validate_non_empty_string("supabase.key", &supabase.key)?;
            validation::validate_non_empty_string(
                "supabase.geocoding_table",
                &supabase.geocoding_table,
            )?;
            validation::validate_non_empty_string(
                "supabase.reverse_table",
                &supabase.reverse_table,
            )?;
            validation::validate_positive_number("supabase.page_size", supabase.page_size, 1)?;
        }

        validation::validate_url("clinichq.endpoint", &self.clinichq.endpoint)?;
        validation::validate_url("geocoder.mapbox_endpoint", &self.geocoder.mapbox_endpoint)?;
        validation::validate_url("geocoder.google_endpoint", &self.geocoder.google_endpoint)?;
        if let Some(proximity) = &self.geocoder.proximity {
            validation::validate_proximity("geocoder.proximity", proximity)?;
        }
        if let Some(max) = self.geocoder.max_records {
            validation::validate_positive_number("geocoder.max_records", max, 1)?;
        }

        validation::validate_range("matching.threshold", self.matching.threshold, 0.0, 1.0)?;

        for (field, file) in [
            ("compare.left_csv", &self.compare.left_csv),
            ("compare.right_csv", &self.compare.right_csv),
        ] {
            if let Some(file) = file {
                validation::validate_file_extension(field, file, &["csv"])?;
            }
        }
        validation::validate_non_empty_string(
            "compare.address_column",
            &self.compare.address_column,
        )?;

        Ok(())
    }

    pub fn data_dir(&self) -> &str {
        &self.paths.data_dir
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    /// Supabase settings, or an error naming what is missing.
    pub fn require_supabase(&self) -> Result<&SupabaseConfig> {
        validation::validate_required_field("supabase.url / SUPABASE_URL", &self.supabase)
    }

    /// Both CSV exports, when the comparison should run on local files.
    pub fn compare_csv_files(&self) -> Option<(&str, &str)> {
        match (&self.compare.left_csv, &self.compare.right_csv) {
            (Some(left), Some(right)) => Some((left.as_str(), right.as_str())),
            _ => None,
        }
    }

    pub fn zip_bundle(&self) -> Option<&str> {
        self.compare
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
