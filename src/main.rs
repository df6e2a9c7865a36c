use anyhow::Context;
use clap::Parser;
use clinic_geo::adapters::{ClinicHqClient, SupabaseCache};
use clinic_geo::app::{
    self,
    pipelines::{
        AddressSource, ComparePipeline, GeocodePipeline, ProcessPipeline, ReversePipeline,
        StatsPipeline,
    },
};
use clinic_geo::utils::{logger, validation::Validate};
use clinic_geo::{AppConfig, CliConfig, Command, EtlEngine, EtlError, LocalStorage};

const REDACTED: &str = "********";

/// Effective configuration with credentials masked.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    if let Some(supabase) = shown.supabase.as_mut() {
        supabase.key = REDACTED.to_string();
    }
    for secret in [
        &mut shown.geocoder.mapbox_token,
        &mut shown.geocoder.google_api_key,
        &mut shown.clinichq.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    shown
}

async fn run(
    command: &Command,
    config: &AppConfig,
    storage: LocalStorage,
    monitor: bool,
) -> clinic_geo::Result<String> {
    match command {
        Command::Process { input, fetch } => {
            let mut pipeline = ProcessPipeline::new(storage, input.clone());
            if *fetch {
                pipeline = pipeline.with_fetcher(ClinicHqClient::from_config(&config.clinichq)?);
            }
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Geocode { input, .. } => {
            let pipeline = GeocodePipeline::new(
                storage,
                app::build_geocoder(&config.geocoder)?,
                app::build_cache(config)?,
                input.clone(),
            )
            .with_max_records(config.geocoder.max_records);
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Reverse { input } => {
            let pipeline = ReversePipeline::new(
                storage,
                app::build_reverse_geocoder(&config.geocoder)?,
                app::build_cache(config)?,
                input.clone(),
            );
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Compare { .. } => {
            let source = match config.compare_csv_files() {
                Some((left, right)) => AddressSource::Csv {
                    left: left.to_string(),
                    right: right.to_string(),
                    column: config.compare.address_column.clone(),
                },
                None => AddressSource::Supabase(SupabaseCache::from_config(
                    config.require_supabase()?,
                )?),
            };
            let pipeline = ComparePipeline::new(storage, source, config.matching.threshold)
                .with_zip_bundle(config.zip_bundle().map(str::to_string));
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Stats => {
            let cache = match &config.supabase {
                Some(supabase) => Some(SupabaseCache::from_config(supabase)?),
                None => {
                    tracing::warn!("⚠️ Supabase not configured, skipping cache statistics");
                    None
                }
            };
            let pipeline = StatsPipeline::new(storage, cache);
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
    }
}

fn report_failure(e: &EtlError) {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    cli.apply_overrides(&mut config);

    if cli.json_logs {
        logger::init_json_logger(cli.verbose, config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }

    tracing::info!("Starting {} v{}", config.pipeline.name, config.pipeline.version);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report_failure(&e);
        std::process::exit(e.exit_code());
    }

    if cli.dry_run {
        let shown = toml::to_string_pretty(&redacted(&config))
            .context("failed to render the effective configuration")?;
        println!("🔍 Dry run, nothing will be executed. Effective configuration:\n");
        println!("{}", shown);
        return Ok(());
    }

    let monitor = cli.monitor_enabled(&config);
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.data_dir().to_string());

    match run(&cli.command, &config, storage, monitor).await {
        Ok(output_path) => {
            tracing::info!("✅ Run completed successfully!");
            println!("✅ Run completed successfully!");
            println!("📁 Output saved to: {}/{}", config.data_dir(), output_path);
        }
        Err(e) => {
            report_failure(&e);
            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
