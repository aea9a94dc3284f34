//! Video frame types and processing

use image::{imageops, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixels (3 channels, 8 bits each)
    pub image: RgbImage,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Wrap an RGB image as a frame
    pub fn new(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            image,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)), 0, 0)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Flip horizontally in place (self-view for live cameras)
    pub fn mirror(&mut self) {
        imageops::flip_horizontal_in_place(&mut self.image);
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width() * self.height()) as usize);
        for pixel in self.image.as_raw().chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Crop a region of the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<VideoFrame> {
        if w == 0 || h == 0 || x + w > self.width() || y + h > self.height() {
            return None;
        }

        let cropped = imageops::crop_imm(&self.image, x, y, w, h).to_image();
        Some(VideoFrame::new(cropped, self.timestamp_ns, self.sequence))
    }

    /// Resize frame using bilinear interpolation
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        let resized = imageops::resize(
            &self.image,
            new_width,
            new_height,
            imageops::FilterType::Triangle,
        );
        VideoFrame::new(resized, self.timestamp_ns, self.sequence)
    }
}

/// Convert packed YUYV (4:2:2) to RGB24.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]. BT.601 coefficients.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let expected = (width * height * 2) as usize;
    if width % 2 != 0 || yuyv.len() < expected {
        return None;
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for &y in &[chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }
    Some(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let image = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 0]));
        VideoFrame::new(image, 7, 3)
    }

    #[test]
    fn test_mirror_swaps_columns() {
        let mut frame = gradient(4, 2);
        frame.mirror();
        assert_eq!(frame.get_pixel(0, 1), Some([3, 1, 0]));
        assert_eq!(frame.get_pixel(3, 0), Some([0, 0, 0]));
        assert_eq!((frame.width(), frame.height()), (4, 2));
    }

    #[test]
    fn test_crop_bounds() {
        let frame = gradient(8, 8);
        let cropped = frame.crop(2, 3, 4, 4).unwrap();
        assert_eq!(cropped.get_pixel(0, 0), Some([2, 3, 0]));
        assert_eq!(cropped.sequence, 3);
        assert!(frame.crop(6, 6, 4, 4).is_none());
        assert!(frame.crop(0, 0, 0, 4).is_none());
    }

    #[test]
    fn test_grayscale_white() {
        let frame = VideoFrame::filled(2, 2, [255, 255, 255]);
        assert!(frame.to_grayscale().iter().all(|&v| v >= 254));
    }

    #[test]
    fn test_yuyv_gray() {
        // Neutral chroma keeps luma on every channel
        let yuyv = [100, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
        assert!(yuyv_to_rgb(&yuyv, 4, 1).is_none());
    }
}
