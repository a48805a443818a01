//! Supervisor and proxy for the external prediction service.
//!
//! The service is a separate HTTP process (a Python app) listening on a fixed
//! local address. This module probes it, bootstraps it on demand and forwards
//! prediction requests to it:
//!
//! ```text
//! unknown -> checking -> ready
//!                     -> absent -> installing_dependencies -> starting -> ready | failed
//! ```
//!
//! Readiness is never cached: every gated call probes again. The recorded
//! state is only there so operators can see what the supervisor last saw.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gramseva_core::model::{PredictionServerState, PredictionStatus, SupervisorStatus};
use gramseva_core::now_ms;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Liveness probe path on the prediction service.
pub const HEALTH_PATH: &str = "/health";
/// Prediction path on the prediction service.
pub const PREDICT_PATH: &str = "/predict";

/// How to reach and bootstrap the prediction service.
#[derive(Debug, Clone)]
pub struct PredictionSettings {
    /// e.g. `http://127.0.0.1:5001`, without trailing slash.
    pub base_url: String,
    /// Interpreter used for the version check, installs and launch.
    pub runtime: String,
    pub script: PathBuf,
    pub workdir: Option<PathBuf>,
    /// Installed one at a time, in order.
    pub packages: Vec<String>,
    pub probe_timeout: Duration,
    pub settle_delay: Duration,
    pub settle_probe_timeout: Duration,
    pub predict_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Prediction service is not ready")]
    NotReady,
    #[error("{runtime} is not installed")]
    RuntimeMissing { runtime: String, details: String },
    #[error("Failed to install {package}")]
    InstallFailed { package: String, stderr: String },
    #[error("Failed to launch prediction server")]
    LaunchFailed(String),
    #[error("Prediction server did not become ready")]
    NotReadyAfterStart,
    #[error("Prediction failed")]
    Upstream(String),
    #[error("Invalid response from prediction server")]
    InvalidResponse,
    #[error("Failed to reach prediction server")]
    Transport(String),
}

impl PredictionError {
    /// Extra detail for the client, when there is any.
    pub fn details(&self) -> Option<String> {
        match self {
            PredictionError::RuntimeMissing { details, .. } => Some(details.clone()),
            PredictionError::InstallFailed { stderr, .. } => Some(stderr.clone()),
            PredictionError::LaunchFailed(d)
            | PredictionError::Upstream(d)
            | PredictionError::Transport(d) => Some(d.clone()),
            PredictionError::NotReady
            | PredictionError::NotReadyAfterStart
            | PredictionError::InvalidResponse => None,
        }
    }
}

/// Result of a successful `ensure_started`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning,
    Started { pid: Option<u32> },
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs for the bootstrap sequence.
pub trait ProcessRunner: Send + Sync + 'static {
    /// Runs `program args..` to completion, capturing output.
    fn output(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = io::Result<ProcessOutput>> + Send;

    /// Starts `program args..` in the background and returns its pid.
    fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> io::Result<Option<u32>>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        let out = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(ProcessOutput {
            success: out.status.success(),
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }

    fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> io::Result<Option<u32>> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        // Own process group, so a Ctrl-C aimed at the daemon does not reach it.
        #[cfg(unix)]
        cmd.process_group(0);
        // Dropping the handle leaves the service running; tokio reaps it on exit.
        let child = cmd.spawn()?;
        Ok(child.id())
    }
}

/// Supervises the prediction service and proxies requests to it.
pub struct PredictionManager<R: ProcessRunner = SystemRunner> {
    settings: PredictionSettings,
    client: reqwest::Client,
    runner: R,
    status: RwLock<SupervisorStatus>,
    bootstrap_lock: Mutex<()>,
    bootstrapping: AtomicBool,
}

impl PredictionManager<SystemRunner> {
    pub fn new(settings: PredictionSettings) -> Self {
        Self::with_runner(settings, SystemRunner)
    }
}

impl<R: ProcessRunner> PredictionManager<R> {
    pub fn with_runner(settings: PredictionSettings, runner: R) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            runner,
            status: RwLock::new(SupervisorStatus::default()),
            bootstrap_lock: Mutex::new(()),
            bootstrapping: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &PredictionSettings {
        &self.settings
    }

    /// Last recorded supervisor state.
    pub async fn status(&self) -> SupervisorStatus {
        self.status.read().await.clone()
    }

    /// Probes the service. Never fails; any error is `NotReady`.
    pub async fn check_status(&self) -> PredictionStatus {
        let record = !self.bootstrapping.load(Ordering::SeqCst);
        if record {
            self.set_state(PredictionServerState::Checking, None).await;
        }

        let ready = self.probe(self.settings.probe_timeout).await;

        // A bootstrap may have started while the probe was in flight.
        if record && !self.bootstrapping.load(Ordering::SeqCst) {
            let state = if ready {
                PredictionServerState::Ready
            } else {
                PredictionServerState::Absent
            };
            self.set_state(state, None).await;
        }

        if ready {
            PredictionStatus::Ready
        } else {
            PredictionStatus::NotReady
        }
    }

    /// Brings the service up if it is not answering.
    ///
    /// Verifies the runtime, installs each package strictly in order (stopping
    /// at the first failure), launches the service, waits for it to settle and
    /// probes once more. Nothing is retried.
    pub async fn ensure_started(&self) -> Result<StartOutcome, PredictionError> {
        let _guard = self.bootstrap_lock.lock().await;

        if self.check_status().await.is_ready() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let flag = BootstrapFlag::raise(&self.bootstrapping);
        let result = self.bootstrap().await;
        drop(flag);

        match &result {
            Ok(outcome) => info!(?outcome, "prediction server ready"),
            Err(e) => {
                let detail = e.details().unwrap_or_default();
                warn!(error = %e, details = %detail, "prediction server bootstrap failed");
                self.set_state(PredictionServerState::Failed, Some(join_error(e)))
                    .await;
            }
        }
        result
    }

    async fn bootstrap(&self) -> Result<StartOutcome, PredictionError> {
        let runtime = self.settings.runtime.clone();

        let version = self
            .runner
            .output(&runtime, &["--version".to_string()])
            .await;
        match version {
            Ok(out) if out.success => {
                info!(runtime = %runtime, version = %first_non_empty(&out.stdout, &out.stderr), "runtime found");
            }
            Ok(out) => {
                return Err(PredictionError::RuntimeMissing {
                    runtime,
                    details: first_non_empty(&out.stderr, &out.stdout).to_string(),
                });
            }
            Err(e) => {
                return Err(PredictionError::RuntimeMissing {
                    runtime,
                    details: e.to_string(),
                });
            }
        }

        self.set_state(PredictionServerState::InstallingDependencies, None)
            .await;
        for package in &self.settings.packages {
            info!(package = %package, "installing prediction dependency");
            let args = ["-m", "pip", "install", package.as_str()].map(String::from);
            let out = self
                .runner
                .output(&runtime, &args)
                .await
                .map_err(|e| PredictionError::InstallFailed {
                    package: package.clone(),
                    stderr: e.to_string(),
                })?;
            if !out.success {
                warn!(
                    package = %package,
                    code = ?out.code,
                    stdout = %out.stdout,
                    stderr = %out.stderr,
                    "dependency install failed"
                );
                return Err(PredictionError::InstallFailed {
                    package: package.clone(),
                    stderr: out.stderr,
                });
            }
            debug!(package = %package, "dependency installed");
        }

        self.set_state(PredictionServerState::Starting, None).await;
        let script = self.settings.script.display().to_string();
        let pid = self
            .runner
            .spawn_detached(&runtime, &[script], self.settings.workdir.as_deref())
            .map_err(|e| PredictionError::LaunchFailed(e.to_string()))?;
        self.status.write().await.pid = pid;
        info!(?pid, "prediction server launched; waiting for it to settle");

        tokio::time::sleep(self.settings.settle_delay).await;

        if self.probe(self.settings.settle_probe_timeout).await {
            self.set_state(PredictionServerState::Ready, None).await;
            Ok(StartOutcome::Started { pid })
        } else {
            Err(PredictionError::NotReadyAfterStart)
        }
    }

    /// Forwards `input` to the service once it reports ready.
    pub async fn predict(&self, input: &Value) -> Result<Value, PredictionError> {
        if !self.check_status().await.is_ready() {
            return Err(PredictionError::NotReady);
        }

        let url = format!("{}{}", self.settings.base_url, PREDICT_PATH);
        let resp = self
            .client
            .post(&url)
            .timeout(self.settings.predict_timeout)
            .json(input)
            .send()
            .await
            .map_err(|e| PredictionError::Transport(e.to_string()))?;

        let text = resp
            .text()
            .await
            .map_err(|e| PredictionError::Transport(e.to_string()))?;
        let body: Value =
            serde_json::from_str(&text).map_err(|_| PredictionError::InvalidResponse)?;

        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            let msg = match err {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(PredictionError::Upstream(msg));
        }

        Ok(body)
    }

    async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}{}", self.settings.base_url, HEALTH_PATH);
        let resp = match self.client.get(&url).timeout(timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, url = %url, "prediction probe failed");
                return false;
            }
        };
        match resp.json::<Value>().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, url = %url, "prediction probe returned non-JSON");
                false
            }
        }
    }

    async fn set_state(&self, state: PredictionServerState, error: Option<String>) {
        let mut status = self.status.write().await;
        if status.state != state {
            debug!(from = ?status.state, to = ?state, "prediction state change");
        }
        status.state = state;
        if error.is_some() || state == PredictionServerState::Ready {
            status.last_error = error;
        }
        status.updated_at_ms = now_ms();
    }
}

/// Holds `bootstrapping` up until dropped, including when the bootstrap
/// future is cancelled mid-flight.
struct BootstrapFlag<'a>(&'a AtomicBool);

impl<'a> BootstrapFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BootstrapFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodically probes the service so the recorded state stays current.
pub fn spawn_watchdog<R: ProcessRunner>(manager: Arc<PredictionManager<R>>, every: Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            let status = manager.check_status().await;
            debug!(?status, "watchdog probe");
        }
    });
}

fn join_error(e: &PredictionError) -> String {
    match e.details() {
        Some(d) if !d.is_empty() => format!("{e}: {d}"),
        _ => e.to_string(),
    }
}

fn first_non_empty<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a.trim().is_empty() {
        b.trim()
    } else {
        a.trim()
    }
}
