use crate::core::{Pipeline, RecordCount};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: RunMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub fn monitor(&self) -> &RunMonitor {
        &self.monitor
    }

    pub async fn run(&self) -> Result<String> {
        let name = self.pipeline.name();
        tracing::info!("🚀 Starting {} run", name);

        tracing::debug!("Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        let extracted = raw_data.record_count();
        tracing::info!("Extracted {} records", extracted);
        self.monitor.checkpoint("extract", extracted);

        tracing::debug!("Transforming data...");
        let transformed = self.pipeline.transform(raw_data).await?;
        let produced = transformed.record_count();
        tracing::info!("Transformed into {} records", produced);
        self.monitor.checkpoint("transform", produced);

        tracing::debug!("Loading data...");
        let output_path = self.pipeline.load(transformed).await?;
        self.monitor.checkpoint("load", produced);
        tracing::info!("📁 {} output saved to: {}", name, output_path);

        if self.monitor.is_enabled() {
            self.monitor.log_final_stats();
        }
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;

    struct CountingPipeline {
        fail_on_load: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for CountingPipeline {
        type Extracted = Vec<u32>;
        type Transformed = Vec<u32>;

        fn name(&self) -> &str {
            "counting"
        }

        async fn extract(&self) -> Result<Vec<u32>> {
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<u32>) -> Result<Vec<u32>> {
            Ok(data.into_iter().filter(|n| n % 2 == 1).collect())
        }

        async fn load(&self, result: Vec<u32>) -> Result<String> {
            if self.fail_on_load {
                return Err(EtlError::ProcessingError {
                    message: "load failed".to_string(),
                });
            }
            Ok(format!("{} items", result.len()))
        }
    }

    #[tokio::test]
    async fn test_run_records_each_phase() {
        let engine = EtlEngine::new(CountingPipeline {
            fail_on_load: false,
        });
        let output = engine.run().await.unwrap();
        assert_eq!(output, "2 items");

        let phases = engine.monitor().phases();
        let names: Vec<&str> = phases.iter().map(|p| p.phase.as_str()).collect();
        assert_eq!(names, vec!["extract", "transform", "load"]);
        assert_eq!(phases[0].items, 3);
        assert_eq!(phases[1].items, 2);
    }

    #[tokio::test]
    async fn test_monitoring_flag_reaches_monitor() {
        let quiet = EtlEngine::new(CountingPipeline {
            fail_on_load: false,
        });
        assert!(!quiet.monitor().is_enabled());

        let monitored = EtlEngine::new_with_monitoring(
            CountingPipeline {
                fail_on_load: false,
            },
            true,
        );
        assert!(monitored.monitor().is_enabled());
        monitored.run().await.unwrap();
        assert_eq!(monitored.monitor().phases().len(), 3);
    }

    #[tokio::test]
    async fn test_run_propagates_load_error() {
        let engine = EtlEngine::new(CountingPipeline { fail_on_load: true });
        assert!(engine.run().await.is_err());
        assert_eq!(engine.monitor().phases().len(), 2);
    }
}
