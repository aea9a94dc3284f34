//! Live frame pipeline
//!
//! One cycle: acquire, mirror, maybe detect, render, encode, publish. The run
//! loop owns the frame source and checks the run flag before every cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use camera_capture::{codec, CameraError, FrameSource, VideoFrame};
use emotion::{DetectionSnapshot, EmotionModel};
use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::overlay::{render, RenderOptions};
use crate::publisher::{EncodedFrame, StreamPublisher};
use crate::{DetectionThrottle, PipelineConfig, PipelineError, SharedDetection};

/// Where the pipeline is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Acquiring,
    Detecting,
    SkippingDetection,
    Rendering,
    Emitting,
    Stopped,
}

/// What the detection step of a cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionStep {
    /// Throttled; the previous snapshot was reused
    Skipped,
    /// The model ran and the snapshot was replaced
    Updated { faces: usize, elapsed: Duration },
    /// The model failed; the previous snapshot was kept
    Failed { error: String, elapsed: Duration },
}

/// Result of one processed frame
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub detection: DetectionStep,
    /// Snapshot the overlay was rendered from
    pub snapshot: DetectionSnapshot,
}

/// Producer side of the live pipeline
pub struct FramePipeline {
    model: Arc<dyn EmotionModel>,
    state: SharedDetection,
    throttle: DetectionThrottle,
    options: RenderOptions,
    mirror: bool,
    jpeg_quality: u8,
    stage: CycleStage,
}

impl FramePipeline {
    pub fn new(model: Arc<dyn EmotionModel>, state: SharedDetection, config: &PipelineConfig) -> Self {
        Self {
            model,
            state,
            throttle: DetectionThrottle::new(config.detection_interval),
            options: RenderOptions::from_config(config),
            mirror: config.mirror,
            jpeg_quality: config.jpeg_quality,
            stage: CycleStage::Idle,
        }
    }

    pub fn stage(&self) -> CycleStage {
        self.stage
    }

    /// Mirror, run the throttled detection and draw the overlay in place
    pub fn process(&mut self, frame: &mut VideoFrame) -> CycleOutcome {
        if self.mirror {
            frame.mirror();
        }

        let detection = if self.throttle.should_detect() {
            self.stage = CycleStage::Detecting;
            self.detect(frame)
        } else {
            self.stage = CycleStage::SkippingDetection;
            DetectionStep::Skipped
        };

        self.stage = CycleStage::Rendering;
        let snapshot = self.state.read();
        render(frame, &snapshot, &self.options);

        CycleOutcome { detection, snapshot }
    }

    fn detect(&self, frame: &VideoFrame) -> DetectionStep {
        let start = Instant::now();
        match self.model.detect_emotions(frame) {
            Ok(faces) => {
                let elapsed = start.elapsed();
                let snapshot = DetectionSnapshot::from_faces(&faces);
                debug!(
                    faces = faces.len(),
                    dominant = ?snapshot.dominant,
                    confidence = snapshot.confidence,
                    "Detection updated"
                );
                self.state.write(snapshot);
                DetectionStep::Updated {
                    faces: faces.len(),
                    elapsed,
                }
            }
            Err(e) => {
                warn!(error = %e, "Emotion detection failed, keeping previous result");
                DetectionStep::Failed {
                    error: e.to_string(),
                    elapsed: start.elapsed(),
                }
            }
        }
    }

    /// One full cycle against a frame source
    pub fn run_cycle(
        &mut self,
        source: &mut dyn FrameSource,
        publisher: &StreamPublisher,
    ) -> Result<CycleOutcome, PipelineError> {
        self.stage = CycleStage::Acquiring;
        let mut frame = source.next_frame()?;

        let outcome = self.process(&mut frame);

        self.stage = CycleStage::Emitting;
        let jpeg = codec::encode_jpeg(&frame, self.jpeg_quality)?;
        publisher.publish(EncodedFrame::new(jpeg, frame.sequence, frame.timestamp_ns));

        self.stage = CycleStage::Idle;
        Ok(outcome)
    }

    /// Run cycles until `running` is cleared or acquisition fails.
    ///
    /// Corrupt frames and encode failures drop that frame only. The source is
    /// opened on the first cycle and dropped on every exit path. Returns the
    /// number of frames emitted.
    pub fn run<F>(
        &mut self,
        open_source: F,
        publisher: &StreamPublisher,
        running: &AtomicBool,
    ) -> Result<u64, PipelineError>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>, CameraError>,
    {
        self.throttle.reset();
        if !running.load(Ordering::Acquire) {
            self.stage = CycleStage::Stopped;
            return Ok(0);
        }

        self.stage = CycleStage::Acquiring;
        let mut source = match open_source() {
            Ok(source) => source,
            Err(e) => {
                self.stage = CycleStage::Stopped;
                error!(error = %e, "Failed to open frame source");
                return Err(e.into());
            }
        };
        info!(source = %source.describe(), "Frame source opened");

        let mut emitted = 0u64;
        let result = loop {
            if !running.load(Ordering::Acquire) {
                break Ok(emitted);
            }

            match self.run_cycle(source.as_mut(), publisher) {
                Ok(outcome) => {
                    emitted += 1;
                    record_metrics(&outcome);
                }
                Err(PipelineError::Acquisition(e)) if !e.is_recoverable() => {
                    error!(error = %e, frames = emitted, "Frame acquisition failed, stopping pipeline");
                    break Err(PipelineError::Acquisition(e));
                }
                Err(e) => {
                    counter!("emotion_frames_dropped_total").increment(1);
                    warn!(error = %e, "Dropping frame");
                }
            }
        };

        self.stage = CycleStage::Stopped;
        drop(source);
        info!(frames = emitted, "Frame source released");
        result
    }
}

fn record_metrics(outcome: &CycleOutcome) {
    counter!("emotion_frames_total").increment(1);
    match &outcome.detection {
        DetectionStep::Skipped => {}
        DetectionStep::Updated { elapsed, .. } => {
            counter!("emotion_detections_total").increment(1);
            histogram!("emotion_inference_seconds").record(elapsed.as_secs_f64());
        }
        DetectionStep::Failed { elapsed, .. } => {
            counter!("emotion_inference_failures_total").increment(1);
            histogram!("emotion_inference_seconds").record(elapsed.as_secs_f64());
        }
    }
}
