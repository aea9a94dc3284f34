//! Emotion Lens - Main Entry Point

use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.log)?;

    info!("=== Emotion Lens v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        camera = %config.camera.device,
        interval = config.pipeline.detection_interval,
        "Starting emotion detection server..."
    );

    run_server(config).await
}
