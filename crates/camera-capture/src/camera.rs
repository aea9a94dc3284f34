//! V4L2 webcam capture via the `v4l` crate.

use std::path::Path;
use std::time::Instant;

use image::ImageFormat;
use tracing::{debug, info};
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::frame::{yuyv_to_rgb, VideoFrame};
use crate::source::FrameSource;
use crate::{CameraConfig, CameraError};

/// Negotiated wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Mjpeg,
    Yuyv,
}

/// V4L2 camera streaming through memory-mapped buffers.
///
/// The device is closed when the camera is dropped.
pub struct V4lCamera {
    stream: MmapStream<'static>,
    _device: Device,
    device_path: String,
    width: u32,
    height: u32,
    format: WireFormat,
    started: Instant,
}

impl V4lCamera {
    /// Open the device and start streaming at the configured size
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        if !Path::new(&config.device).exists() {
            return Err(CameraError::Open(format!("device not found: {}", config.device)));
        }

        let device = Device::with_path(&config.device)
            .map_err(|e| CameraError::Open(format!("{}: {e}", config.device)))?;

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::Format(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"MJPG");
        fmt.width = config.width;
        fmt.height = config.height;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::Format(format!("failed to set format: {e}")))?;

        let format = if negotiated.fourcc == FourCC::new(b"MJPG") {
            WireFormat::Mjpeg
        } else if negotiated.fourcc == FourCC::new(b"YUYV") {
            WireFormat::Yuyv
        } else {
            return Err(CameraError::Format(format!(
                "unsupported pixel format: {:?} (need MJPG or YUYV)",
                negotiated.fourcc
            )));
        };

        let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, 4)
            .map_err(|e| CameraError::Stream(format!("failed to create mmap stream: {e}")))?;

        info!(
            device = %config.device,
            width = negotiated.width,
            height = negotiated.height,
            format = ?format,
            "opened camera"
        );

        Ok(Self {
            stream,
            _device: device,
            device_path: config.device.clone(),
            width: negotiated.width,
            height: negotiated.height,
            format,
            started: Instant::now(),
        })
    }
}

impl FrameSource for V4lCamera {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::Disconnected(format!("{}: {e}", self.device_path)))?;

        let image = match self.format {
            WireFormat::Mjpeg => image::load_from_memory_with_format(buf, ImageFormat::Jpeg)
                .map_err(|e| CameraError::CorruptFrame(format!("MJPG frame: {e}")))?
                .to_rgb8(),
            WireFormat::Yuyv => {
                let rgb = yuyv_to_rgb(buf, self.width, self.height).ok_or_else(|| {
                    CameraError::CorruptFrame(format!("YUYV buffer too short: {} bytes", buf.len()))
                })?;
                image::RgbImage::from_raw(self.width, self.height, rgb)
                    .ok_or_else(|| CameraError::CorruptFrame("YUYV frame size mismatch".to_string()))?
            }
        };
        debug!(sequence = meta.sequence, "captured frame");

        Ok(VideoFrame::new(
            image,
            self.started.elapsed().as_nanos() as u64,
            meta.sequence,
        ))
    }

    fn describe(&self) -> String {
        format!("v4l2 camera {} ({}x{})", self.device_path, self.width, self.height)
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        info!(device = %self.device_path, "camera released");
    }
}
