//! Boundary adapter: upload bytes → RGB raster → grayscale field.

use std::io::Cursor;

use image::io::Reader as ImageReader;
use image::{GrayImage, ImageFormat, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::import::{sniff_format, SniffedFormat};

/// Smallest valid PNG is ~67 bytes; anything shorter cannot be an image.
pub const MIN_IMAGE_BYTES: usize = 67;

/// Default cap on upload size (50 MB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Default cap on the longest side. Contour extraction cost grows with area.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Image data too small to be valid ({0} bytes)")]
    TooSmall(usize),

    #[error("Image data exceeds {limit_mb}MB limit")]
    TooLarge { limit_mb: usize },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("Failed to decode image: {0}")]
    Malformed(String),

    #[error("Image has zero width or height")]
    EmptyImage,

    #[error("Image dimensions {width}x{height} exceed {max} pixel limit")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },
}

/// Resource bounds. Both are checked before any pixel data is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateLimits {
    pub max_image_bytes: usize,
    pub max_dimension: u32,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Validate byte bounds before decoding. Saves decode time on junk.
pub fn validate_image_bytes(bytes: &[u8], limits: &GateLimits) -> Result<(), DecodeError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(DecodeError::TooSmall(bytes.len()));
    }
    if bytes.len() > limits.max_image_bytes {
        return Err(DecodeError::TooLarge {
            limit_mb: limits.max_image_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

/// Decode a JPEG or PNG upload into an RGB raster.
///
/// The format is taken from magic bytes; anything else is refused even if
/// the `image` crate could read it. Dimensions come from the header alone,
/// so an oversized image is refused before its pixel buffer is allocated.
pub fn decode_image(bytes: &[u8], limits: &GateLimits) -> Result<RgbImage, DecodeError> {
    validate_image_bytes(bytes, limits)?;

    let format = match sniff_format(bytes) {
        SniffedFormat::Jpeg => ImageFormat::Jpeg,
        SniffedFormat::Png => ImageFormat::Png,
        other => return Err(DecodeError::UnsupportedFormat(other.mime_type())),
    };

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    check_dimensions(width, height, limits)?;

    let img = ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    Ok(img.to_rgb8())
}

fn check_dimensions(width: u32, height: u32, limits: &GateLimits) -> Result<(), DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage);
    }
    if width.max(height) > limits.max_dimension {
        return Err(DecodeError::DimensionsTooLarge {
            width,
            height,
            max: limits.max_dimension,
        });
    }
    Ok(())
}

/// ITU-R BT.601 luma, rounded.
pub fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32;
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn encode(img: RgbImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, format)
            .unwrap();
        cursor.into_inner()
    }

    /// Random pixels compress badly, so the encoded PNG is several KB.
    fn speckle() -> RgbImage {
        let mut rng = StdRng::seed_from_u64(3);
        RgbImage::from_fn(64, 64, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
    }

    #[test]
    fn decodes_png_with_original_dimensions() {
        let bytes = encode(
            RgbImage::from_pixel(64, 48, Rgb([10, 20, 30])),
            ImageOutputFormat::Png,
        );
        let img = decode_image(&bytes, &GateLimits::default()).unwrap();
        assert_eq!(img.dimensions(), (64, 48));
        assert_eq!(img.get_pixel(5, 5).0, [10, 20, 30]);
    }

    #[test]
    fn decodes_jpeg() {
        let bytes = encode(
            RgbImage::from_pixel(40, 40, Rgb([200, 200, 200])),
            ImageOutputFormat::Jpeg(90),
        );
        let img = decode_image(&bytes, &GateLimits::default()).unwrap();
        assert_eq!(img.dimensions(), (40, 40));
    }

    #[test]
    fn rejects_tiny_buffers() {
        let err = decode_image(&[0x89, 0x50], &GateLimits::default()).unwrap_err();
        assert_eq!(err, DecodeError::TooSmall(2));
    }

    #[test]
    fn rejects_garbage() {
        let garbage = [0xDE, 0xAD, 0xBE, 0xEF].repeat(25);
        let err = decode_image(&garbage, &GateLimits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = encode(speckle(), ImageOutputFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];
        let err = decode_image(truncated, &GateLimits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.to_string().contains("decode"));
    }

    #[test]
    fn rejects_pdf_even_if_well_formed() {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.extend(std::iter::repeat(b' ').take(100));
        let err = decode_image(&pdf, &GateLimits::default()).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedFormat("application/pdf"));
    }

    #[test]
    fn enforces_byte_limit() {
        let bytes = encode(speckle(), ImageOutputFormat::Png);
        let limits = GateLimits {
            max_image_bytes: 500,
            ..GateLimits::default()
        };
        assert!(bytes.len() > 500);
        assert!(matches!(
            decode_image(&bytes, &limits),
            Err(DecodeError::TooLarge { .. })
        ));
    }

    #[test]
    fn enforces_dimension_limit() {
        let bytes = encode(
            RgbImage::from_pixel(300, 20, Rgb([0, 0, 0])),
            ImageOutputFormat::Png,
        );
        let limits = GateLimits {
            max_dimension: 256,
            ..GateLimits::default()
        };
        assert_eq!(
            decode_image(&bytes, &limits).unwrap_err(),
            DecodeError::DimensionsTooLarge {
                width: 300,
                height: 20,
                max: 256
            }
        );
    }

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                let mask = (crc & 1).wrapping_neg();
                crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
            }
        }
        !crc
    }

    /// Valid PNG whose IHDR has been rewritten to claim `width` x `height`.
    /// The pixel data still belongs to a 64x64 image.
    fn png_claiming(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = encode(speckle(), ImageOutputFormat::Png);
        assert_eq!(&bytes[12..16], b"IHDR");
        bytes[16..20].copy_from_slice(&width.to_be_bytes());
        bytes[20..24].copy_from_slice(&height.to_be_bytes());
        let crc = crc32(&bytes[12..29]);
        bytes[29..33].copy_from_slice(&crc.to_be_bytes());
        bytes
    }

    #[test]
    fn oversized_header_is_refused_before_decoding() {
        let bytes = png_claiming(60_000, 60_000);
        assert!(bytes.len() < 64 * 1024);

        assert_eq!(
            decode_image(&bytes, &GateLimits::default()).unwrap_err(),
            DecodeError::DimensionsTooLarge {
                width: 60_000,
                height: 60_000,
                max: DEFAULT_MAX_DIMENSION
            }
        );
    }

    #[test]
    fn grayscale_preserves_dimensions_and_extremes() {
        let white = to_grayscale(&RgbImage::from_pixel(12, 7, Rgb([255, 255, 255])));
        assert_eq!(white.dimensions(), (12, 7));
        assert_eq!(white.get_pixel(0, 0).0[0], 255);

        let black = to_grayscale(&RgbImage::from_pixel(3, 3, Rgb([0, 0, 0])));
        assert_eq!(black.get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn grayscale_weights_green_heaviest() {
        let red = to_grayscale(&RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        let green = to_grayscale(&RgbImage::from_pixel(1, 1, Rgb([0, 255, 0])));
        let blue = to_grayscale(&RgbImage::from_pixel(1, 1, Rgb([0, 0, 255])));

        assert_eq!(red.get_pixel(0, 0).0[0], 76);
        assert_eq!(green.get_pixel(0, 0).0[0], 150);
        assert_eq!(blue.get_pixel(0, 0).0[0], 29);
    }
}
