use std::path::PathBuf;
use std::time::Duration;

use crate::prediction::PredictionSettings;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,

    /// Fully resolved path of the leak report file.
    pub leak_file: PathBuf,

    pub prediction_url: String,
    pub prediction_runtime: String,
    pub prediction_script: PathBuf,
    pub prediction_workdir: Option<PathBuf>,
    pub prediction_packages: Vec<String>,

    pub probe_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub settle_probe_timeout_ms: u64,
    pub predict_timeout_ms: u64,

    /// Zero disables the watchdog.
    pub watchdog_interval_seconds: u64,
    pub broadcast_interval_seconds: u64,
}

impl DaemonConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn prediction_settings(&self) -> PredictionSettings {
        PredictionSettings {
            base_url: self.prediction_url.trim_end_matches('/').to_string(),
            runtime: self.prediction_runtime.clone(),
            script: self.prediction_script.clone(),
            workdir: self.prediction_workdir.clone(),
            packages: self.prediction_packages.clone(),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            settle_probe_timeout: Duration::from_millis(self.settle_probe_timeout_ms),
            predict_timeout: Duration::from_millis(self.predict_timeout_ms),
        }
    }
}
