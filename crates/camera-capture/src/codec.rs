//! Image codec: decode uploads, encode rendered frames as JPEG

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

use crate::VideoFrame;

/// JPEG quality used for streamed and returned frames
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Codec error types
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl CodecError {
    /// Whether the error was caused by the input bytes rather than by us
    pub fn is_input_error(&self) -> bool {
        matches!(self, CodecError::Decode(_) | CodecError::Base64(_))
    }
}

/// Decode any supported image format into an RGB frame
pub fn decode(bytes: &[u8]) -> Result<VideoFrame, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Decode("empty payload".to_string()));
    }

    let img = image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(VideoFrame::new(img.to_rgb8(), 0, 0))
}

/// Encode a frame as baseline JPEG
pub fn encode_jpeg(frame: &VideoFrame, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&frame.image)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Strip an optional `data:<mime>;base64,` header
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => payload,
    }
}

/// Decode a base64 image, with or without a data URI header
pub fn decode_data_uri(payload: &str) -> Result<VideoFrame, CodecError> {
    let body = strip_data_uri(payload.trim()).trim();
    let bytes = STANDARD.decode(body)?;
    decode(&bytes)
}

/// Wrap JPEG bytes into a `data:image/jpeg;base64,` URI
pub fn encode_data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("AAAA"), "AAAA");
    }

    #[test]
    fn test_data_uri_roundtrip() {
        let frame = VideoFrame::filled(32, 24, [10, 200, 30]);
        let jpeg = encode_jpeg(&frame, DEFAULT_JPEG_QUALITY).unwrap();
        let uri = encode_data_uri(&jpeg);
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_malformed_base64() {
        let err = decode_data_uri("data:image/jpeg;base64,@@not-base64@@").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_garbage_bytes() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(matches!(decode(&[]), Err(CodecError::Decode(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_encode_decode_keeps_dimensions(width in 1u32..96, height in 1u32..96, quality in 1u8..=100) {
            let frame = VideoFrame::filled(width, height, [120, 60, 200]);
            let jpeg = encode_jpeg(&frame, quality).unwrap();
            let decoded = decode(&jpeg).unwrap();
            prop_assert_eq!((decoded.width(), decoded.height()), (width, height));
        }
    }
}
