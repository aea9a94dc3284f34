//! Emotion Lens API Server
//!
//! HTTP surface of the live emotion detector: single-shot analysis, the MJPEG
//! video feed, pipeline control and status, health and metrics.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod config;
pub mod error;
pub mod rate_limit;
mod routes;

pub use config::{AppConfig, LogConfig, LogFormat};
pub use error::ApiError;

use emotion::ModelSlot;
use frame_pipeline::PipelineManager;

/// Application state shared across handlers
pub struct AppState {
    /// Live pipeline and model owner
    pub pipeline: Arc<PipelineManager>,
    /// Effective configuration
    pub config: AppConfig,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, pipeline: Arc<PipelineManager>) -> Self {
        Self {
            pipeline,
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// State with a pipeline over the configured camera and model
    pub fn from_config(config: AppConfig) -> Self {
        let pipeline = Arc::new(build_pipeline(&config));
        Self::new(config, pipeline)
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Pipeline manager over the configured camera and a lazily loaded model
pub fn build_pipeline(config: &AppConfig) -> PipelineManager {
    PipelineManager::with_camera(
        config.pipeline.clone(),
        config.camera.clone(),
        Arc::new(ModelSlot::from_config(config.model.clone())),
    )
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub pipeline_running: bool,
    pub model_loaded: bool,
}

/// Warmup response
#[derive(Debug, Serialize)]
pub struct WarmupResponse {
    pub status: String,
    pub model: String,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    let mut analyze = post(routes::analyze::analyze);
    if state.config.rate_limit.enabled {
        match rate_limit::create_governor_config(&state.config.rate_limit) {
            Some(config) => analyze = analyze.layer(GovernorLayer { config }),
            None => warn!("Invalid rate limit quota, /analyze is not rate limited"),
        }
    }

    Router::new()
        .route("/analyze", analyze)
        .route("/video_feed", get(routes::stream::video_feed))
        .route("/emotions", get(routes::pipeline::emotions))
        .route("/start", get(routes::pipeline::start))
        .route("/stop", get(routes::pipeline::stop))
        .route("/health", get(health_handler))
        .route("/warmup", get(warmup_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        pipeline_running: state.pipeline.is_running(),
        model_loaded: state.pipeline.model_loaded(),
    })
}

/// Load the model eagerly
async fn warmup_handler(State(state): State<SharedState>) -> Result<Json<WarmupResponse>, ApiError> {
    let pipeline = Arc::clone(&state.pipeline);
    let model = tokio::task::spawn_blocking(move || pipeline.warmup())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(WarmupResponse {
        status: "model loaded".to_string(),
        model: model.name().to_string(),
    }))
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Metrics recorder not installed".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder once and return its handle
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS.get_or_init(|| handle).clone())
}

/// Run the server until Ctrl-C or SIGTERM
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let metrics = install_metrics()?;
    let pipeline = Arc::new(build_pipeline(&config));

    if config.pipeline.autostart {
        let starting = Arc::clone(&pipeline);
        match tokio::task::spawn_blocking(move || starting.start()).await? {
            Ok(_) => info!("Pipeline autostarted"),
            Err(e) => warn!(error = %e, "Pipeline autostart failed"),
        }
    }

    let addr = config.server.address();
    let state = Arc::new(AppState::new(config, Arc::clone(&pipeline)).with_metrics(metrics));
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let publisher = pipeline.publisher();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            publisher.close();
        })
        .await?;

    tokio::task::spawn_blocking(move || pipeline.shutdown()).await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
