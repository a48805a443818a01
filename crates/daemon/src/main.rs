use anyhow::Context;
use clap::Parser;
use gramseva_daemon::{
    config::DaemonConfig,
    http::{self, AppState},
    leak_store::LeakStore,
    prediction::{self, PredictionManager},
    realtime::Broadcaster,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gramseva-daemon", version, about = "GramSeva rural services API")]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "GRAMSEVA_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP listen port.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Directory holding persisted state.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Leak report file. Relative paths are resolved against --data-dir.
    #[arg(long, default_value = "leak_reports.txt")]
    leak_file: PathBuf,

    /// Base URL of the prediction service.
    #[arg(long, default_value = "http://127.0.0.1:5001")]
    prediction_url: String,

    /// Interpreter used to install and launch the prediction service.
    #[arg(long, default_value = "python3")]
    prediction_runtime: String,

    /// Entry script of the prediction service.
    #[arg(long, default_value = "ml/app.py")]
    prediction_script: PathBuf,

    /// Working directory for the prediction service process.
    #[arg(long)]
    prediction_workdir: Option<PathBuf>,

    /// Package installed before launch; repeat for several, installed in order.
    #[arg(
        long = "prediction-package",
        default_values_t = ["flask", "flask-cors", "numpy", "pandas", "scikit-learn", "joblib"].map(String::from)
    )]
    prediction_packages: Vec<String>,

    #[arg(long, default_value_t = 2_000)]
    probe_timeout_ms: u64,

    /// Wait after launching before the confirming probe.
    #[arg(long, default_value_t = 5_000)]
    settle_delay_ms: u64,

    #[arg(long, default_value_t = 5_000)]
    settle_probe_timeout_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    predict_timeout_ms: u64,

    /// Prediction watchdog probe interval; 0 disables it.
    #[arg(long, default_value_t = 30)]
    watchdog_interval_seconds: u64,

    /// Realtime feed push interval.
    #[arg(long, default_value_t = 5)]
    broadcast_interval_seconds: u64,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(&cli.log))
        .init();

    let config = DaemonConfig {
        host: cli.host,
        port: cli.port,
        leak_file: make_abs(&cli.data_dir, &cli.leak_file),
        prediction_url: cli.prediction_url,
        prediction_runtime: cli.prediction_runtime,
        prediction_script: cli.prediction_script,
        prediction_workdir: cli.prediction_workdir,
        prediction_packages: cli.prediction_packages,
        probe_timeout_ms: cli.probe_timeout_ms,
        settle_delay_ms: cli.settle_delay_ms,
        settle_probe_timeout_ms: cli.settle_probe_timeout_ms,
        predict_timeout_ms: cli.predict_timeout_ms,
        watchdog_interval_seconds: cli.watchdog_interval_seconds,
        broadcast_interval_seconds: cli.broadcast_interval_seconds,
    };

    info!("starting daemon with config: {:?}", config);

    let leaks = Arc::new(LeakStore::new(config.leak_file.clone()));
    let prediction = Arc::new(PredictionManager::new(config.prediction_settings()));
    let realtime = Arc::new(Broadcaster::new(
        Duration::from_secs(config.broadcast_interval_seconds.max(1)),
        64,
    ));

    // Background tasks
    realtime.start().await;
    if config.watchdog_interval_seconds > 0 {
        prediction::spawn_watchdog(
            Arc::clone(&prediction),
            Duration::from_secs(config.watchdog_interval_seconds),
        );
    }

    let app = http::router(AppState {
        leaks,
        prediction,
        realtime: Arc::clone(&realtime),
    });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    realtime.stop().await;
    Ok(())
}

fn make_abs(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
