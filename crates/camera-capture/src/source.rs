//! Frame sources feeding the live pipeline

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{codec, CameraConfig, CameraError, VideoFrame};

/// A blocking producer of frames.
///
/// Dropping the source releases the underlying device.
pub trait FrameSource: Send {
    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Open the source named by `config.device`.
///
/// Directories are replayed as image sequences, anything else is treated as a
/// V4L2 device node.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    let path = Path::new(&config.device);
    if path.is_dir() {
        let source = ImageSequenceSource::open(path, config.fps, config.loop_playback)?;
        return Ok(Box::new(source));
    }
    open_device(config)
}

#[cfg(feature = "v4l")]
fn open_device(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Ok(Box::new(crate::camera::V4lCamera::open(config)?))
}

#[cfg(not(feature = "v4l"))]
fn open_device(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Err(CameraError::Unsupported(format!(
        "{}: camera devices need the `v4l` feature",
        config.device
    )))
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replays the image files of a directory, sorted by name, at a fixed rate
pub struct ImageSequenceSource {
    directory: PathBuf,
    paths: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    frame_interval: Option<Duration>,
    last_emit: Option<Instant>,
    started: Instant,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Open a directory of images. `fps == 0` disables pacing.
    pub fn open(directory: &Path, fps: u32, looping: bool) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(directory)
            .map_err(|e| CameraError::Open(format!("{}: {e}", directory.display())))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::Open(format!(
                "no image files in {}",
                directory.display()
            )));
        }

        info!(
            directory = %directory.display(),
            frames = paths.len(),
            fps,
            looping,
            "opened image sequence"
        );

        Ok(Self {
            directory: directory.to_path_buf(),
            paths,
            cursor: 0,
            looping,
            frame_interval: (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64)),
            last_emit: None,
            started: Instant::now(),
            sequence: 0,
        })
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return Err(CameraError::EndOfStream);
            }
            self.cursor = 0;
        }

        let path = &self.paths[self.cursor];
        self.cursor += 1;

        let bytes = std::fs::read(path)
            .map_err(|e| CameraError::Stream(format!("{}: {e}", path.display())))?;
        let mut frame = codec::decode(&bytes)
            .map_err(|e| CameraError::CorruptFrame(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "replaying frame");

        self.pace();
        frame.timestamp_ns = self.started.elapsed().as_nanos() as u64;
        frame.sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("image sequence {} ({} frames)", self.directory.display(), self.paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_jpeg, DEFAULT_JPEG_QUALITY};

    fn write_frames(dir: &Path, count: usize) {
        for i in 0..count {
            let frame = VideoFrame::filled(16, 8, [i as u8 * 40, 0, 0]);
            let jpeg = encode_jpeg(&frame, DEFAULT_JPEG_QUALITY).unwrap();
            std::fs::write(dir.join(format!("frame_{i:03}.jpg")), jpeg).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();
    }

    #[test]
    fn test_sequence_ends() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);

        let mut source = ImageSequenceSource::open(dir.path(), 0, false).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.next_frame().unwrap().sequence, 0);
        assert_eq!(source.next_frame().unwrap().sequence, 1);
        assert!(matches!(source.next_frame(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn test_sequence_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);

        let mut source = ImageSequenceSource::open(dir.path(), 0, true).unwrap();
        for expected in 0..5 {
            let frame = source.next_frame().unwrap();
            assert_eq!(frame.sequence, expected);
            assert_eq!((frame.width(), frame.height()), (16, 8));
        }
    }

    #[test]
    fn test_corrupt_file_is_skippable() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        std::fs::write(dir.path().join("frame_000b.jpg"), b"corrupt mjpeg frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 0, true).unwrap();
        assert_eq!(source.len(), 3);
        assert!(source.next_frame().is_ok());

        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, CameraError::CorruptFrame(_)));
        assert!(err.is_recoverable());

        assert_eq!(source.next_frame().unwrap().sequence, 1);
        assert_eq!(source.next_frame().unwrap().sequence, 2);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), 0, false),
            Err(CameraError::Open(_))
        ));
    }

    #[test]
    fn test_open_source_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 1);

        let config = CameraConfig::replay(dir.path().to_string_lossy(), 0);
        let mut source = open_source(&config).unwrap();
        assert!(source.describe().contains("1 frames"));
        assert!(source.next_frame().is_ok());
    }

    #[cfg(not(feature = "v4l"))]
    #[test]
    fn test_device_without_v4l() {
        let config = CameraConfig::webcam();
        assert!(matches!(open_source(&config), Err(CameraError::Unsupported(_))));
    }
}
