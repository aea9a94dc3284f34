//! Emotion model seam, mock implementation, and the lazily loaded model slot

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use camera_capture::VideoFrame;
use tracing::{info, warn};

use crate::{EmotionConfig, EmotionError, EmotionLabel, Face, FaceBox, OnnxEmotionModel};

/// Face detection plus expression classification.
///
/// Faces come back ordered by detector confidence; the first one is the
/// primary face.
pub trait EmotionModel: Send + Sync {
    /// Detect faces and score their expressions
    fn detect_emotions(&self, frame: &VideoFrame) -> Result<Vec<Face>, EmotionError>;

    /// Model name for logs and the warmup endpoint
    fn name(&self) -> &str;
}

/// Fixed centered face with neutral-leaning scores
#[derive(Debug, Clone, Default)]
pub struct MockEmotionModel;

impl MockEmotionModel {
    pub fn new() -> Self {
        Self
    }
}

impl EmotionModel for MockEmotionModel {
    fn detect_emotions(&self, frame: &VideoFrame) -> Result<Vec<Face>, EmotionError> {
        let (width, height) = (frame.width() as f32, frame.height() as f32);
        let bbox = FaceBox::new(
            (width * 0.3) as i32,
            (height * 0.2) as i32,
            (width * 0.4) as i32,
            (height * 0.5) as i32,
        );
        Ok(vec![Face::new(
            bbox,
            [
                (EmotionLabel::Happy, 0.20),
                (EmotionLabel::Sad, 0.05),
                (EmotionLabel::Angry, 0.03),
                (EmotionLabel::Surprise, 0.08),
                (EmotionLabel::Fear, 0.02),
                (EmotionLabel::Disgust, 0.02),
                (EmotionLabel::Neutral, 0.60),
            ],
        )])
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build the configured model.
///
/// Both ONNX paths select the tract model; neither selects the mock.
pub fn load_model(config: &EmotionConfig) -> Result<Arc<dyn EmotionModel>, EmotionError> {
    match (&config.detector_model_path, &config.classifier_model_path) {
        (Some(detector), Some(classifier)) => {
            Ok(Arc::new(OnnxEmotionModel::load(detector, classifier, config)?))
        }
        (None, None) => {
            warn!("No model paths configured. Using mock implementation.");
            Ok(Arc::new(MockEmotionModel::new()))
        }
        _ => Err(EmotionError::Config(
            "detector_model_path and classifier_model_path must be set together".to_string(),
        )),
    }
}

type Loader = dyn Fn() -> Result<Arc<dyn EmotionModel>, EmotionError> + Send + Sync;

/// Process-wide model holder.
///
/// The first `get` runs the loader under the slot's lock; concurrent callers
/// wait for it and share the result, so loading happens once. A failed load
/// leaves the slot empty and the next call retries.
pub struct ModelSlot {
    loader: Box<Loader>,
    model: Mutex<Option<Arc<dyn EmotionModel>>>,
    loads: AtomicUsize,
}

impl ModelSlot {
    /// Create a slot around a custom loader
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EmotionModel>, EmotionError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Create a slot that loads the configured model
    pub fn from_config(config: EmotionConfig) -> Self {
        Self::new(move || load_model(&config))
    }

    /// Create a slot that is already loaded
    pub fn preloaded(model: Arc<dyn EmotionModel>) -> Self {
        let slot = Self::new(|| Err(EmotionError::Config("preloaded slot has no loader".into())));
        *slot.model.lock().unwrap_or_else(PoisonError::into_inner) = Some(model);
        slot
    }

    /// Get the model, loading it on first use
    pub fn get(&self) -> Result<Arc<dyn EmotionModel>, EmotionError> {
        let mut guard = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = guard.as_ref() {
            return Ok(Arc::clone(model));
        }

        info!("Loading emotion detection model...");
        let start = Instant::now();
        let model = (self.loader)()?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        info!(
            model = model.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded successfully"
        );

        *guard = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Whether a model is resident
    pub fn is_loaded(&self) -> bool {
        self.model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of successful loader runs
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}
