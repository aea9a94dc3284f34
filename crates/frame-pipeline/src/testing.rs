//! Test doubles for models and frame sources

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use camera_capture::{CameraError, FrameSource, VideoFrame};
use emotion::{EmotionError, EmotionLabel, EmotionModel, Face, FaceBox};

/// Scripted model: each call pops the next result, repeating the last one
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Vec<Face>, String>>>,
    last: Mutex<Result<Vec<Face>, String>>,
    pub calls: Arc<AtomicUsize>,
    pub seen_pixel: Mutex<Option<[u8; 3]>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<Vec<Face>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Ok(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            seen_pixel: Mutex::new(None),
        }
    }

    pub fn always(faces: Vec<Face>) -> Self {
        Self::new(vec![Ok(faces)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmotionModel for ScriptedModel {
    fn detect_emotions(&self, frame: &VideoFrame) -> Result<Vec<Face>, EmotionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_pixel.lock().unwrap() = frame.get_pixel(0, 0);

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone().map_err(EmotionError::Inference)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn happy_face() -> Face {
    Face::new(
        FaceBox::new(20, 40, 60, 60),
        [(EmotionLabel::Happy, 0.8), (EmotionLabel::Neutral, 0.2)],
    )
}

pub fn sad_face() -> Face {
    Face::new(
        FaceBox::new(10, 50, 40, 40),
        [(EmotionLabel::Sad, 0.7), (EmotionLabel::Neutral, 0.3)],
    )
}

/// In-memory source; records when it is dropped
pub struct FakeSource {
    remaining: Option<usize>,
    produced: u32,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
    pub released: Arc<AtomicBool>,
}

impl FakeSource {
    /// Yields `frames` frames then `EndOfStream`; `None` never ends
    pub fn new(frames: Option<usize>) -> Self {
        Self {
            remaining: frames,
            produced: 0,
            stop_after: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clear `flag` once `frames` frames have been produced
    pub fn stopping(frames: usize, flag: Arc<AtomicBool>) -> Self {
        let mut source = Self::new(None);
        source.stop_after = Some((frames, flag));
        source
    }
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(CameraError::EndOfStream);
            }
            *remaining -= 1;
        }

        let mut frame = VideoFrame::filled(160, 120, [40, 40, 40]);
        frame.image.put_pixel(159, 0, image::Rgb([255, 0, 0]));
        frame.sequence = self.produced;
        frame.timestamp_ns = u64::from(self.produced) * 33_000_000;
        self.produced += 1;

        if let Some((limit, flag)) = &self.stop_after {
            if self.produced as usize >= *limit {
                flag.store(false, Ordering::SeqCst);
            }
        }
        Ok(frame)
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Replays a fixed list of acquisition results, then `EndOfStream`
pub struct ScriptedSource {
    script: VecDeque<Result<VideoFrame, CameraError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<VideoFrame, CameraError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        self.script.pop_front().unwrap_or(Err(CameraError::EndOfStream))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Frame with the given sequence number
pub fn numbered_frame(sequence: u32) -> VideoFrame {
    let mut frame = VideoFrame::filled(64, 48, [40, 40, 40]);
    frame.sequence = sequence;
    frame
}
