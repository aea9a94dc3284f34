//! Standalone emotion detector
//!
//! Runs the live pipeline with the score panel and writes every rendered
//! frame to `demo.output_path` until Ctrl-C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use api::{build_pipeline, init_logging, AppConfig};
use frame_pipeline::PipelineConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    init_logging(&config.log)?;

    let presentation = PipelineConfig::standalone();
    config.pipeline.score_panel = presentation.score_panel;
    if config.pipeline.footer.is_none() {
        config.pipeline.footer = presentation.footer;
    }

    info!("=== Emotion Detector v{} ===", env!("CARGO_PKG_VERSION"));
    let pipeline = Arc::new(build_pipeline(&config));
    let starting = Arc::clone(&pipeline);
    tokio::task::spawn_blocking(move || starting.start()).await??;

    let output = config.demo.output_path.clone();
    info!(output = %output.display(), "Writing frames, press Ctrl-C to quit");

    let fps = config.camera.fps.max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / u64::from(fps)));
    let publisher = pipeline.publisher();
    let mut last_sequence = None;
    let mut last_dominant = None;
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                if !pipeline.is_running() {
                    warn!("Pipeline ended");
                    break;
                }

                let snapshot = pipeline.snapshot();
                if snapshot.dominant != last_dominant {
                    match snapshot.dominant {
                        Some(label) => info!(
                            emotion = %label,
                            confidence = snapshot.confidence,
                            "Dominant emotion changed"
                        ),
                        None => info!("No face detected"),
                    }
                    last_dominant = snapshot.dominant;
                }

                let Some(frame) = publisher.latest() else { continue };
                if last_sequence == Some(frame.sequence) {
                    continue;
                }
                last_sequence = Some(frame.sequence);
                if let Err(e) = write_atomically(&output, &frame.jpeg).await {
                    warn!(error = %e, "Failed to write frame");
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || pipeline.shutdown()).await?;
    Ok(())
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let staging = path.with_extension("partial");
    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, path).await
}
