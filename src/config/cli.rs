use crate::config::toml_config::{AppConfig, GeocoderProvider};
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "clinic-geo")]
#[command(about = "Clean, geocode and reconcile clinic appointment addresses")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "clinic-geo.toml")]
    pub config: String,

    /// Override the data directory from config
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Log per-phase timings and memory
    #[arg(long)]
    pub monitor: bool,

    /// Show the effective configuration without running anything
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Clean raw ClinicHQ appointments into processed and dirty records
    Process {
        /// Raw appointments file inside the data directory
        #[arg(long, default_value = "clinichq_raw_data.json")]
        input: String,

        /// Download appointments from ClinicHQ before processing
        #[arg(long)]
        fetch: bool,
    },

    /// Forward geocode the cat and owner addresses of processed records
    Geocode {
        #[arg(long, default_value = "processed_cat_data.json")]
        input: String,

        #[arg(long, value_enum)]
        provider: Option<GeocoderProvider>,

        /// Only geocode the first N records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Reverse geocode a list of locations with coordinates
    Reverse {
        #[arg(long, default_value = "locations.json")]
        input: String,
    },

    /// Match addresses between the forward and reverse geocode caches
    Compare {
        /// Minimum similarity for a fuzzy match
        #[arg(long)]
        threshold: Option<f64>,

        /// CSV export standing in for the forward cache table
        #[arg(long, requires = "right_csv")]
        left_csv: Option<String>,

        /// CSV export standing in for the reverse cache table
        #[arg(long, requires = "left_csv")]
        right_csv: Option<String>,

        /// Also bundle the report files into this ZIP archive
        #[arg(long)]
        zip: Option<String>,
    },

    /// Print geocode cache and data file statistics
    Stats,
}

impl CliConfig {
    /// Command-line flags win over the config file.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(data_dir) = &self.data_dir {
            config.paths.data_dir = data_dir.clone();
        }

        match &self.command {
            Command::Geocode {
                provider, limit, ..
            } => {
                if let Some(provider) = provider {
                    config.geocoder.provider = *provider;
                    tracing::info!("🔧 Geocoder overridden to: {}", provider);
                }
                if let Some(limit) = limit {
                    config.geocoder.max_records = Some(*limit);
                }
            }
            Command::Compare {
                threshold,
                left_csv,
                right_csv,
                zip,
            } => {
                if let Some(threshold) = threshold {
                    config.matching.threshold = *threshold;
                }
                if left_csv.is_some() && right_csv.is_some() {
                    config.compare.left_csv = left_csv.clone();
                    config.compare.right_csv = right_csv.clone();
                }
                if let Some(filename) = zip {
                    config.compare.compression = Some(crate::config::toml_config::CompressionConfig {
                        enabled: true,
                        filename: filename.clone(),
                    });
                }
            }
            Command::Process { .. } | Command::Reverse { .. } | Command::Stats => {}
        }
    }

    pub fn monitor_enabled(&self, config: &AppConfig) -> bool {
        self.monitor || config.monitoring_enabled()
    }
}
