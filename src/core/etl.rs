use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting ETL process...");

        // Extract
        tracing::info!("Retrieving approved drugs...");
        let drugs = self.pipeline.extract().await?;
        tracing::info!("Extracted {} approved drugs", drugs.len());
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("Resolving targets and keywords...");
        let reports = self.pipeline.transform(drugs).await?;
        tracing::info!(
            "Resolved {} drug-target pairs across {} distinct targets",
            reports.drug_targets.len(),
            reports.target_keywords.len()
        );
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("Writing reports...");
        let output_path = self.pipeline.load(reports).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
