//! Pipeline manager
//!
//! Owns everything that lives for the whole process: the model slot, the
//! shared detection state, the stream publisher and at most one producer
//! thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use camera_capture::{open_source, CameraConfig, CameraError, FrameSource};
use emotion::{DetectionSnapshot, EmotionError, EmotionModel, ModelSlot};
use tracing::{error, info, warn};

use crate::{FramePipeline, PipelineConfig, PipelineError, SharedDetection, StreamPublisher};

/// Opens the frame source for a new live run
pub type SourceFactory =
    Arc<dyn Fn() -> Result<Box<dyn FrameSource>, CameraError> + Send + Sync>;

/// Clears the run flag when the producer thread exits, panics included
struct ClearOnExit(Arc<AtomicBool>);

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lifecycle owner of the live pipeline
pub struct PipelineManager {
    config: PipelineConfig,
    model: Arc<ModelSlot>,
    sources: SourceFactory,
    state: SharedDetection,
    publisher: StreamPublisher,
    /// Set while a producer thread runs; read without any lock
    running: Arc<AtomicBool>,
    /// Serializes start and stop; holds the producer thread handle
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PipelineManager {
    pub fn new(config: PipelineConfig, model: Arc<ModelSlot>, sources: SourceFactory) -> Self {
        Self {
            config,
            model,
            sources,
            state: SharedDetection::new(),
            publisher: StreamPublisher::new(),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Manager whose runs open the configured camera or replay directory
    pub fn with_camera(config: PipelineConfig, camera: CameraConfig, model: Arc<ModelSlot>) -> Self {
        Self::new(config, model, Arc::new(move || open_source(&camera)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The model, loaded on first use
    pub fn model(&self) -> Result<Arc<dyn EmotionModel>, EmotionError> {
        self.model.get()
    }

    /// Load the model now instead of on the first request
    pub fn warmup(&self) -> Result<Arc<dyn EmotionModel>, EmotionError> {
        self.model()
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Copy of the latest detection
    pub fn snapshot(&self) -> DetectionSnapshot {
        self.state.read()
    }

    pub fn shared_state(&self) -> SharedDetection {
        self.state.clone()
    }

    pub fn publisher(&self) -> StreamPublisher {
        self.publisher.clone()
    }

    /// Start a live run unless one is active.
    ///
    /// Returns `Ok(false)` when a run was already active. The model is loaded
    /// before the producer thread is spawned, so load errors surface here.
    /// Neither the load nor the spawn blocks `is_running`.
    pub fn start(&self) -> Result<bool, PipelineError> {
        if self.is_running() {
            return Ok(false);
        }
        let model = self.model.get()?;

        let mut worker = self.lock_worker();
        if self.is_running() {
            return Ok(false);
        }
        if let Some(finished) = worker.take() {
            join(finished);
        }

        let mut pipeline = FramePipeline::new(model, self.state.clone(), &self.config);
        self.publisher.reopen();
        let publisher = self.publisher.clone();
        let sources = Arc::clone(&self.sources);
        let flag = Arc::clone(&self.running);

        self.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("emotion-pipeline".to_string())
            .spawn(move || {
                let _clear = ClearOnExit(Arc::clone(&flag));
                match pipeline.run(|| sources(), &publisher, &flag) {
                    Ok(frames) => info!(frames, "Pipeline stopped"),
                    Err(e) => {
                        error!(error = %e, "Pipeline terminated");
                        publisher.close();
                    }
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(PipelineError::ThreadSpawn(e.to_string()));
            }
        };

        info!(
            interval = self.config.detection_interval,
            mirror = self.config.mirror,
            "Pipeline started"
        );
        *worker = Some(handle);
        Ok(true)
    }

    /// Stop the live run and wait until its frame source is released.
    ///
    /// Returns whether a live run was stopped. The snapshot keeps its value.
    pub fn stop(&self) -> bool {
        let mut worker = self.lock_worker();
        let Some(handle) = worker.take() else {
            return false;
        };

        let was_live = self.running.swap(false, Ordering::AcqRel);
        join(handle);
        was_live
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop everything before the process exits
    pub fn shutdown(&self) {
        if self.stop() {
            info!("Pipeline shut down");
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PipelineManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("Pipeline thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{happy_face, FakeSource, ScriptedModel};
    use emotion::EmotionLabel;
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn factory<F>(open: F) -> SourceFactory
    where
        F: Fn() -> Result<Box<dyn FrameSource>, CameraError> + Send + Sync + 'static,
    {
        Arc::new(open)
    }

    fn manager_with(sources: SourceFactory) -> PipelineManager {
        let model = Arc::new(ScriptedModel::always(vec![happy_face()]));
        PipelineManager::new(
            PipelineConfig::default(),
            Arc::new(ModelSlot::preloaded(model)),
            sources,
        )
    }

    #[test]
    fn test_start_stop_releases_source() {
        let released = Arc::new(Mutex::new(Vec::<Arc<AtomicBool>>::new()));
        let opened = Arc::clone(&released);
        let manager = manager_with(factory(move || {
            let source = FakeSource::new(None);
            opened.lock().unwrap().push(Arc::clone(&source.released));
            Ok(Box::new(source) as Box<dyn FrameSource>)
        }));

        assert!(manager.start().unwrap());
        assert!(!manager.start().unwrap());
        assert!(manager.is_running());
        assert!(wait_until(|| manager.publisher().latest().is_some()));

        assert!(manager.stop());
        assert!(!manager.is_running());
        let flags = released.lock().unwrap();
        assert_eq!(flags.len(), 1);
        assert!(flags[0].load(Ordering::SeqCst));
        drop(flags);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.dominant, Some(EmotionLabel::Happy));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(manager.snapshot(), snapshot);
        assert!(!manager.stop());
    }

    #[test]
    fn test_restart_opens_new_source() {
        let opens = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&opens);
        let manager = manager_with(factory(move || {
            *counter.lock().unwrap() += 1;
            Ok(Box::new(FakeSource::new(None)) as Box<dyn FrameSource>)
        }));

        assert!(manager.start().unwrap());
        assert!(wait_until(|| *opens.lock().unwrap() == 1));
        manager.stop();
        assert!(manager.start().unwrap());
        assert!(wait_until(|| *opens.lock().unwrap() == 2));
        manager.shutdown();
        assert!(!manager.is_running());
    }

    #[test]
    fn test_acquisition_failure_ends_run() {
        let manager = manager_with(factory(|| Err(CameraError::Open("no camera".into()))));

        assert!(manager.start().unwrap());
        assert!(wait_until(|| !manager.is_running()));
        assert!(!manager.stop());
        assert_eq!(manager.snapshot(), DetectionSnapshot::empty());
    }

    #[tokio::test]
    async fn test_source_failure_ends_streams() {
        use tokio_stream::StreamExt;

        let manager = manager_with(factory(|| Err(CameraError::Open("no camera".into()))));
        let mut stream = manager.publisher().subscribe();

        assert!(manager.start().unwrap());
        let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert!(end.is_none());
        assert!(wait_until(|| !manager.is_running()));
    }

    #[test]
    fn test_model_failure_prevents_start() {
        let manager = PipelineManager::new(
            PipelineConfig::default(),
            Arc::new(ModelSlot::new(|| Err(EmotionError::ModelLoad("missing".into())))),
            factory(|| Ok(Box::new(FakeSource::new(None)) as Box<dyn FrameSource>)),
        );

        assert!(matches!(manager.start(), Err(PipelineError::Model(_))));
        assert!(!manager.is_running());
        assert!(!manager.model_loaded());
    }

    /// Model whose every call takes `delay`
    struct SlowModel {
        delay: Duration,
        calls: AtomicBool,
    }

    impl EmotionModel for SlowModel {
        fn detect_emotions(
            &self,
            _frame: &camera_capture::VideoFrame,
        ) -> Result<Vec<emotion::Face>, EmotionError> {
            self.calls.store(true, Ordering::SeqCst);
            thread::sleep(self.delay);
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
        let start = Instant::now();
        let value = f();
        (value, start.elapsed())
    }

    #[test]
    fn test_status_not_blocked_by_model_load() {
        let manager = Arc::new(PipelineManager::new(
            PipelineConfig::default(),
            Arc::new(ModelSlot::new(|| {
                thread::sleep(Duration::from_millis(800));
                Ok(Arc::new(emotion::MockEmotionModel::new()) as Arc<dyn EmotionModel>)
            })),
            factory(|| Ok(Box::new(FakeSource::new(None)) as Box<dyn FrameSource>)),
        ));

        let starting = Arc::clone(&manager);
        let starter = thread::spawn(move || starting.start());
        thread::sleep(Duration::from_millis(50));

        let (running, elapsed) = timed(|| manager.is_running());
        assert!(!running);
        assert!(elapsed < Duration::from_millis(200), "is_running took {elapsed:?}");

        assert!(starter.join().unwrap().unwrap());
        assert!(manager.is_running());
        manager.stop();
    }

    #[test]
    fn test_status_not_blocked_by_stop() {
        let model = Arc::new(SlowModel {
            delay: Duration::from_millis(600),
            calls: AtomicBool::new(false),
        });
        let manager = Arc::new(PipelineManager::new(
            PipelineConfig::default(),
            Arc::new(ModelSlot::preloaded(Arc::clone(&model) as Arc<dyn EmotionModel>)),
            factory(|| Ok(Box::new(FakeSource::new(None)) as Box<dyn FrameSource>)),
        ));

        assert!(manager.start().unwrap());
        assert!(wait_until(|| model.calls.load(Ordering::SeqCst)));

        let stopping = Arc::clone(&manager);
        let stopper = thread::spawn(move || stopping.stop());
        thread::sleep(Duration::from_millis(50));

        let (running, elapsed) = timed(|| manager.is_running());
        assert!(!running);
        assert!(elapsed < Duration::from_millis(200), "is_running took {elapsed:?}");
        assert!(stopper.join().unwrap());
    }

    #[test]
    fn test_warmup_loads_once() {
        let slot = Arc::new(ModelSlot::new(|| {
            Ok(Arc::new(emotion::MockEmotionModel::new()) as Arc<dyn EmotionModel>)
        }));
        let manager = PipelineManager::new(
            PipelineConfig::default(),
            Arc::clone(&slot),
            factory(|| Err(CameraError::EndOfStream)),
        );

        assert!(!manager.model_loaded());
        assert_eq!(manager.warmup().unwrap().name(), "mock");
        manager.model().unwrap();
        assert!(manager.model_loaded());
        assert_eq!(slot.load_count(), 1);
    }
}
