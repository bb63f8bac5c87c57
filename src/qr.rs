//! QR Code Encoding
//!
//! Turns a validated URL into a PNG QR code symbol.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::generator::GenerateError;

/// Pluggable QR symbol encoder. Encoding is CPU-bound and is called from
/// the blocking pool.
pub trait QrEncoder: Send + Sync + 'static {
    fn encode(&self, data: &str) -> Result<Vec<u8>, GenerateError>;
}

/// Encodes with the `qrcode` crate and writes a grayscale PNG.
#[derive(Debug, Clone)]
pub struct PngQrEncoder {
    /// Minimum edge length of the output image in pixels
    min_dimension: u32,
}

impl PngQrEncoder {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }
}

impl Default for PngQrEncoder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode(&self, data: &str) -> Result<Vec<u8>, GenerateError> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| GenerateError::Encode(e.to_string()))?;
        let symbol = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .build();

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(symbol)
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| GenerateError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_png() {
        let png = PngQrEncoder::default()
            .encode("https://chimbori.com/")
            .unwrap();

        let img = image::load_from_memory(&png).unwrap();
        assert!(img.width() >= 256);
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let data = "x".repeat(8000);
        let result = PngQrEncoder::default().encode(&data);
        assert!(matches!(result, Err(GenerateError::Encode(_))));
    }
}
