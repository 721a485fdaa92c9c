use std::{
    fmt,
    sync::{Mutex, OnceLock},
    time::Instant,
};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{
    fmt::{layer, time::UtcTime},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use rackview_util::{AppConfig, Environment};

const VERSION: &str = env!("CARGO_PKG_VERSION");

static METRICS: OnceLock<PrometheusHandle> = OnceLock::new();
static METRICS_INSTALL: Mutex<()> = Mutex::new(());
static STARTED: OnceLock<Instant> = OnceLock::new();

#[derive(Debug)]
pub enum TelemetryError {
    Tracing(TryInitError),
    Metrics(BuildError),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracing(err) => write!(f, "failed to initialize tracing: {err}"),
            Self::Metrics(err) => write!(f, "failed to initialize prometheus recorder: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

fn git_sha() -> &'static str {
    option_env!("GIT_SHA").unwrap_or("unknown")
}

/// Installs the global subscriber: human-readable output outside production,
/// one JSON object per line in production. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base = layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339());
    let output = match config.environment {
        Environment::Production => base.json().boxed(),
        Environment::Development | Environment::Test => base.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(TelemetryError::Tracing)?;

    tracing::info!(
        stage = "telemetry",
        env = config.environment.as_str(),
        version = VERSION,
        git_sha = git_sha(),
        "tracing initialized"
    );
    Ok(())
}

/// Installs the Prometheus recorder once per process and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    let _install = METRICS_INSTALL
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = METRICS.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(TelemetryError::Metrics)?;
    describe_metrics();
    STARTED.get_or_init(Instant::now);
    Ok(METRICS.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_gauge!("app_build_info", "Build metadata for the running binary");
    describe_gauge!("app_uptime_seconds", "Seconds since the process started");
    describe_counter!(
        "rack_builds_total",
        "Count of rack model builds, labelled by result"
    );
    describe_counter!(
        "rack_locations_rejected_total",
        "Count of location codes dropped while building racks, labelled by source"
    );
    describe_counter!(
        "overlay_fetch_total",
        "Count of overlay fetches, labelled by dimension and result"
    );
    describe_histogram!(
        "overlay_fetch_seconds",
        "Latency in seconds of overlay fetches, labelled by dimension"
    );
    describe_counter!(
        "overlay_stale_discarded_total",
        "Count of overlay results discarded because their rack was replaced"
    );
    describe_counter!(
        "api_session_requests_total",
        "Count of session API requests, labelled by operation"
    );
    describe_counter!(
        "sessions_evicted_total",
        "Count of sessions closed by the idle sweep"
    );
    describe_gauge!("sessions_open", "Sessions held by the registry after the last sweep");
}

/// Prometheus text output plus build info and uptime, which are rendered by
/// hand so they are present before any other metric is recorded.
pub fn render_metrics(handle: &PrometheusHandle) -> String {
    let mut body = handle.render();
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }

    let uptime = STARTED
        .get()
        .map(|started| started.elapsed().as_secs_f64())
        .unwrap_or_default();
    body.push_str(&format!(
        "# TYPE app_build_info gauge\napp_build_info{{version=\"{VERSION}\",git=\"{}\"}} 1\n",
        git_sha()
    ));
    body.push_str(&format!(
        "# TYPE app_uptime_seconds gauge\napp_uptime_seconds {uptime}\n"
    ));
    body
}
